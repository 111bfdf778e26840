// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/output/directory_record.rs - 检测历史目录导出
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

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{FromUrl, FromUrlWithScheme, history::HistoryRecord, output::Render};

const HISTORY_INDEX_FILE: &str = "history.json";

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 把每条记录写成 `record-NNNN-source.png`、`record-NNNN-result.png` 与 `record-NNNN.json`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  with_images: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let summary_only = uri.query_pairs().any(|(k, _)| k == "summary-only");
    Ok(Self::new(crate::path_from_url(uri)).with_images(!summary_only))
  }
}

#[derive(Serialize)]
struct IndexEntry<'a> {
  index: usize,
  file: String,
  #[serde(flatten)]
  summary: crate::history::RecordSummary<'a>,
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      with_images: true,
    }
  }

  pub fn with_images(mut self, with_images: bool) -> Self {
    self.with_images = with_images;
    self
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn stem(index: usize) -> String {
    format!("record-{:04}", index)
  }
}

impl Render for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_record(&self, index: usize, record: &HistoryRecord) -> Result<(), Self::Error> {
    std::fs::create_dir_all(&self.directory)?;
    let stem = Self::stem(index);

    if self.with_images {
      record
        .source()
        .image
        .save(self.directory.join(format!("{}-source.png", stem)))?;
      record
        .annotated_image()
        .save(self.directory.join(format!("{}-result.png", stem)))?;
    }

    let summary = serde_json::to_string_pretty(&record.summary())?;
    let path = self.directory.join(format!("{}.json", stem));
    std::fs::write(&path, summary)?;
    debug!("写入检测记录: {}", path.display());
    Ok(())
  }

  fn finish(&self, history: &[Arc<HistoryRecord>]) -> Result<(), Self::Error> {
    std::fs::create_dir_all(&self.directory)?;
    let entries: Vec<IndexEntry<'_>> = history
      .iter()
      .enumerate()
      .map(|(i, record)| IndexEntry {
        index: i + 1,
        file: format!("{}.json", Self::stem(i + 1)),
        summary: record.summary(),
      })
      .collect();

    let path = self.directory.join(HISTORY_INDEX_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(&entries)?)?;
    info!("导出 {} 条检测记录到: {}", entries.len(), self.directory.display());
    Ok(())
  }
}
