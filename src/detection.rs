// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/detection.rs - 检测结果定义
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

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
  #[error("置信度超出范围 [0, 1]: {0}")]
  ConfidenceOutOfRange(f32),
  #[error("边界框无效: [{0}, {1}, {2}, {3}]")]
  InvalidBox(f32, f32, f32, f32),
}

/// 像素坐标系下的边界框，(x1, y1) 为左上角，(x2, y2) 为右下角
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
  x1: f32,
  y1: f32,
  x2: f32,
  y2: f32,
}

impl BoundingBox {
  pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self, DetectionError> {
    let finite = [x1, y1, x2, y2].iter().all(|v| v.is_finite());
    if !finite || x1 >= x2 || y1 >= y2 {
      return Err(DetectionError::InvalidBox(x1, y1, x2, y2));
    }
    Ok(Self { x1, y1, x2, y2 })
  }

  pub fn x1(&self) -> f32 {
    self.x1
  }

  pub fn y1(&self) -> f32 {
    self.y1
  }

  pub fn x2(&self) -> f32 {
    self.x2
  }

  pub fn y2(&self) -> f32 {
    self.y2
  }

  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }

  pub fn area(&self) -> f32 {
    self.width() * self.height()
  }

  pub fn iou(&self, other: &BoundingBox) -> f32 {
    let ix1 = self.x1.max(other.x1);
    let iy1 = self.y1.max(other.y1);
    let ix2 = self.x2.min(other.x2);
    let iy2 = self.y2.min(other.y2);
    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let union = self.area() + other.area() - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
  }

  pub fn as_array(&self) -> [f32; 4] {
    [self.x1, self.y1, self.x2, self.y2]
  }
}

/// 模型适配器输出的原始检测项，尚未解析类别名称
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
  class_id: u32,
  confidence: f32,
  bbox: BoundingBox,
}

impl RawDetection {
  pub fn new(class_id: u32, confidence: f32, bbox: BoundingBox) -> Result<Self, DetectionError> {
    if !(0.0..=1.0).contains(&confidence) {
      return Err(DetectionError::ConfidenceOutOfRange(confidence));
    }
    Ok(Self {
      class_id,
      confidence,
      bbox,
    })
  }

  pub fn class_id(&self) -> u32 {
    self.class_id
  }

  pub fn confidence(&self) -> f32 {
    self.confidence
  }

  pub fn bbox(&self) -> &BoundingBox {
    &self.bbox
  }

  pub(crate) fn resolve(self, label: Option<String>) -> Detection {
    Detection {
      class_id: self.class_id,
      label,
      confidence: self.confidence,
      bbox: self.bbox,
    }
  }
}

/// 一条检测结果。`label` 为 `None` 表示该类别索引无法解析
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  class_id: u32,
  label: Option<String>,
  confidence: f32,
  bbox: BoundingBox,
}

impl Detection {
  pub fn class_id(&self) -> u32 {
    self.class_id
  }

  pub fn label(&self) -> Option<&str> {
    self.label.as_deref()
  }

  pub fn confidence(&self) -> f32 {
    self.confidence
  }

  pub fn bbox(&self) -> &BoundingBox {
    &self.bbox
  }
}

/// 按类别做非极大值抑制，结果按置信度降序排列
pub fn non_max_suppression(
  mut items: Vec<RawDetection>,
  iou_threshold: f32,
  max_detections: usize,
) -> Vec<RawDetection> {
  items.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut kept: Vec<RawDetection> = Vec::new();
  for item in items {
    if kept.len() >= max_detections {
      break;
    }
    let suppressed = kept
      .iter()
      .any(|k| k.class_id == item.class_id && k.bbox.iou(&item.bbox) > iou_threshold);
    if !suppressed {
      kept.push(item);
    }
  }
  kept
}
