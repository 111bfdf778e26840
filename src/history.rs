// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/history.rs - 会话检测历史
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

use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::Serialize;

use crate::detection::Detection;
use crate::settings::NO_INFO_PLACEHOLDER;

/// 图像来源：上传的文件或摄像头拍摄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageOrigin {
  Upload,
  Camera,
}

/// 用户提交的原始图像
#[derive(Debug, Clone)]
pub struct SourceImage {
  pub image: RgbImage,
  pub origin: ImageOrigin,
  pub name: Option<String>,
}

impl SourceImage {
  pub fn new(image: RgbImage, origin: ImageOrigin) -> Self {
    Self {
      image,
      origin,
      name: None,
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// 解码上传或拍摄得到的图像字节
  pub fn decode(bytes: &[u8], origin: ImageOrigin) -> Result<Self, image::ImageError> {
    let image = image::load_from_memory(bytes)?.to_rgb8();
    Ok(Self::new(image, origin))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplanationEntry {
  label: String,
  text: String,
  placeholder: bool,
}

impl ExplanationEntry {
  pub fn found(label: impl Into<String>, text: impl Into<String>) -> Self {
    Self {
      label: label.into(),
      text: text.into(),
      placeholder: false,
    }
  }

  pub fn unavailable(label: impl Into<String>) -> Self {
    Self {
      label: label.into(),
      text: NO_INFO_PLACEHOLDER.to_string(),
      placeholder: true,
    }
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn text(&self) -> &str {
    &self.text
  }

  pub fn is_placeholder(&self) -> bool {
    self.placeholder
  }
}

/// 一次成功检测的结果，创建后不可修改
#[derive(Debug, Clone)]
pub struct HistoryRecord {
  source: SourceImage,
  annotated: RgbImage,
  detections: Vec<Detection>,
  explanations: Vec<ExplanationEntry>,
  confidence: f32,
  created_at: DateTime<Utc>,
}

impl HistoryRecord {
  pub(crate) fn new(
    source: SourceImage,
    annotated: RgbImage,
    detections: Vec<Detection>,
    explanations: Vec<ExplanationEntry>,
    confidence: f32,
  ) -> Self {
    Self {
      source,
      annotated,
      detections,
      explanations,
      confidence,
      created_at: Utc::now(),
    }
  }

  pub fn source(&self) -> &SourceImage {
    &self.source
  }

  pub fn annotated_image(&self) -> &RgbImage {
    &self.annotated
  }

  pub fn detections(&self) -> &[Detection] {
    &self.detections
  }

  pub fn explanations(&self) -> &[ExplanationEntry] {
    &self.explanations
  }

  pub fn confidence(&self) -> f32 {
    self.confidence
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  pub fn summary(&self) -> RecordSummary<'_> {
    RecordSummary {
      origin: self.source.origin,
      name: self.source.name.as_deref(),
      width: self.source.image.width(),
      height: self.source.image.height(),
      confidence: self.confidence,
      created_at: self.created_at,
      detections: &self.detections,
      explanations: &self.explanations,
    }
  }
}

/// 不含图像数据的记录摘要，用于导出
#[derive(Debug, Serialize)]
pub struct RecordSummary<'a> {
  pub origin: ImageOrigin,
  pub name: Option<&'a str>,
  pub width: u32,
  pub height: u32,
  pub confidence: f32,
  pub created_at: DateTime<Utc>,
  pub detections: &'a [Detection],
  pub explanations: &'a [ExplanationEntry],
}

/// 只追加的历史记录序列
#[derive(Debug, Default)]
pub struct History {
  records: Vec<Arc<HistoryRecord>>,
}

impl History {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn append(&mut self, record: Arc<HistoryRecord>) {
    self.records.push(record);
  }

  /// 按插入顺序（最早的在前）返回全部记录
  pub fn all(&self) -> Vec<Arc<HistoryRecord>> {
    self.records.clone()
  }

  pub fn get(&self, index: usize) -> Option<&Arc<HistoryRecord>> {
    self.records.get(index)
  }

  pub fn last(&self) -> Option<&Arc<HistoryRecord>> {
    self.records.last()
  }

  pub fn clear(&mut self) {
    self.records.clear();
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}
