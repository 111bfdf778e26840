// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/settings.rs - 部署默认配置
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

/// 默认检测模型路径
pub const DETECTION_MODEL: &str = "weights/best.onnx";

/// 默认检测模型地址，方案对应 `YoloOnnxBuilder`
pub const DETECTION_MODEL_URL: &str = "yolo:weights/best.onnx";

/// 默认病害说明文件
pub const DISEASE_INFO_FILE: &str = "penyakit_apple_info.json";

/// 默认用户数据库
pub const CREDENTIAL_DATABASE: &str = "users.db";

/// 默认置信度（百分比）
pub const DEFAULT_CONFIDENCE_PERCENT: u8 = 40;

/// 说明表中缺少某个标签时使用的占位文本
pub const NO_INFO_PLACEHOLDER: &str = "Info tidak tersedia";

/// 非极大值抑制的 IoU 阈值
pub const NMS_IOU_THRESHOLD: f32 = 0.7;
