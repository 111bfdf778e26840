// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/model.rs - 检测模型适配器
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

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::detection::RawDetection;

pub const MIN_CONFIDENCE_PERCENT: u8 = 25;
pub const MAX_CONFIDENCE_PERCENT: u8 = 100;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfidenceError {
  #[error("置信度百分比必须在 25 到 100 之间: {0}")]
  PercentOutOfRange(u8),
  #[error("置信度必须在 0.25 到 1.0 之间: {0}")]
  FractionOutOfRange(f32),
}

/// 置信度阈值，取值范围 [0.25, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Confidence(f32);

impl Confidence {
  pub fn new(value: f32) -> Result<Self, ConfidenceError> {
    let min = MIN_CONFIDENCE_PERCENT as f32 / 100.0;
    if !(min..=1.0).contains(&value) {
      return Err(ConfidenceError::FractionOutOfRange(value));
    }
    Ok(Self(value))
  }

  pub fn from_percent(percent: u8) -> Result<Self, ConfidenceError> {
    if !(MIN_CONFIDENCE_PERCENT..=MAX_CONFIDENCE_PERCENT).contains(&percent) {
      return Err(ConfidenceError::PercentOutOfRange(percent));
    }
    Ok(Self(percent as f32 / 100.0))
  }

  pub fn value(&self) -> f32 {
    self.0
  }
}

impl Default for Confidence {
  fn default() -> Self {
    Self(crate::settings::DEFAULT_CONFIDENCE_PERCENT as f32 / 100.0)
  }
}

#[derive(Error, Debug)]
pub enum ModelLoadError {
  #[error("模型文件不存在: {0}")]
  NotFound(PathBuf),
  #[error("无法读取模型文件 {path}: {source}")]
  Unreadable {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("模型文件不兼容 {path}: {reason}")]
  Incompatible { path: PathBuf, reason: String },
}

impl ModelLoadError {
  pub fn incompatible(path: &Path, reason: impl ToString) -> Self {
    ModelLoadError::Incompatible {
      path: path.to_path_buf(),
      reason: reason.to_string(),
    }
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("未知类别索引: {class_id} (类别数量 {class_count})")]
pub struct UnknownClassError {
  pub class_id: u32,
  pub class_count: usize,
}

/// 一次推理的结果：检测项以及已绘制边界框的图像
#[derive(Debug, Clone)]
pub struct Prediction {
  pub detections: Vec<RawDetection>,
  pub annotated: RgbImage,
}

pub trait Model {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 低于 `confidence` 的检测项由适配器自行过滤
  fn predict(&self, image: &RgbImage, confidence: Confidence) -> Result<Prediction, Self::Error>;

  fn class_name_for(&self, class_id: u32) -> Result<String, UnknownClassError>;
}

impl<M: Model> Model for Arc<M> {
  type Error = M::Error;

  fn predict(&self, image: &RgbImage, confidence: Confidence) -> Result<Prediction, Self::Error> {
    (**self).predict(image, confidence)
  }

  fn class_name_for(&self, class_id: u32) -> Result<String, UnknownClassError> {
    (**self).class_name_for(class_id)
  }
}

pub trait LoadModel: Model + Sized {
  fn load(path: &Path) -> Result<Self, ModelLoadError>;
}

/// 检查模型文件是否存在且可读
pub fn ensure_artifact(path: &Path) -> Result<(), ModelLoadError> {
  let metadata = std::fs::metadata(path).map_err(|source| {
    if source.kind() == std::io::ErrorKind::NotFound {
      ModelLoadError::NotFound(path.to_path_buf())
    } else {
      ModelLoadError::Unreadable {
        path: path.to_path_buf(),
        source,
      }
    }
  })?;
  if !metadata.is_file() {
    return Err(ModelLoadError::incompatible(path, "不是普通文件"));
  }
  debug!(
    "模型文件大小: {:.2} MB",
    metadata.len() as f64 / (1024.0 * 1024.0)
  );
  Ok(())
}

/// 按路径缓存已加载的模型，进程生命周期内每个路径只加载一次
pub struct ModelCache<M> {
  models: Mutex<HashMap<PathBuf, Arc<M>>>,
}

impl<M> Default for ModelCache<M> {
  fn default() -> Self {
    Self {
      models: Mutex::new(HashMap::new()),
    }
  }
}

impl<M> ModelCache<M> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get_or_load(&self, path: &Path) -> Result<Arc<M>, ModelLoadError>
  where
    M: LoadModel,
  {
    self.get_or_load_with(path, M::load)
  }

  /// 加载失败不会写入缓存，修正配置后可以重试
  pub fn get_or_load_with<F>(&self, path: &Path, loader: F) -> Result<Arc<M>, ModelLoadError>
  where
    F: FnOnce(&Path) -> Result<M, ModelLoadError>,
  {
    let mut models = match self.models.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };

    if let Some(model) = models.get(path) {
      debug!("使用已缓存的模型: {}", path.display());
      return Ok(Arc::clone(model));
    }

    info!("加载模型文件: {}", path.display());
    let now = std::time::Instant::now();
    let model = Arc::new(loader(path)?);
    info!("模型加载完成，耗时: {:.2?}", now.elapsed());

    models.insert(path.to_path_buf(), Arc::clone(&model));
    Ok(model)
  }

  pub fn len(&self) -> usize {
    match self.models.lock() {
      Ok(guard) => guard.len(),
      Err(poisoned) => poisoned.into_inner().len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

mod yolo;
pub use self::yolo::{
  YOLO_INPUT_SIZE, YOLO_MAX_DETECTIONS, YoloDecodeError, decode_output, parse_class_names,
};

#[cfg(feature = "model_yolo_onnx")]
mod yolo_onnx;
#[cfg(feature = "model_yolo_onnx")]
pub use self::yolo_onnx::{YoloOnnx, YoloOnnxBuilder, YoloOnnxError};
