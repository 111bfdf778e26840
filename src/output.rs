// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/output.rs - 输出定义
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

use thiserror::Error;
use url::Url;

use crate::FromUrl;
use crate::history::HistoryRecord;

pub trait Render: Sized {
  type Error;

  /// `index` 为记录在会话历史中的序号，从 1 开始
  fn render_record(&self, index: usize, record: &HistoryRecord) -> Result<(), Self::Error>;

  /// 会话结束前调用一次，参数为完整历史
  fn finish(&self, _history: &[Arc<HistoryRecord>]) -> Result<(), Self::Error> {
    Ok(())
  }
}

/// 未配置输出时什么也不做
impl<R: Render> Render for Option<R> {
  type Error = R::Error;

  fn render_record(&self, index: usize, record: &HistoryRecord) -> Result<(), Self::Error> {
    match self {
      Some(output) => output.render_record(index, record),
      None => Ok(()),
    }
  }

  fn finish(&self, history: &[Arc<HistoryRecord>]) -> Result<(), Self::Error> {
    match self {
      Some(output) => output.finish(history),
      None => Ok(()),
    }
  }
}

pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("标注图像保存失败: {0}")]
  AnnotatedImage(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("检测历史导出失败: {0}")]
  HistoryExport(#[from] DirectoryRecordOutputError),
  #[error("不支持的输出方案: {0}")]
  UnsupportedScheme(String),
}

/// 按 URL 方案选择的输出目标
pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  AnnotatedImage(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  HistoryExport(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(any(feature = "save_image_file", feature = "directory_record"))]
    use crate::FromUrlWithScheme;

    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => SaveImageFileOutput::from_url(url)
        .map(OutputWrapper::AnnotatedImage)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => DirectoryRecordOutput::from_url(url)
        .map(OutputWrapper::HistoryExport)
        .map_err(OutputError::from),
      other => Err(OutputError::UnsupportedScheme(other.to_string())),
    }
  }
}

impl Render for OutputWrapper {
  type Error = OutputError;

  fn render_record(&self, index: usize, record: &HistoryRecord) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::AnnotatedImage(output) => Ok(output.render_record(index, record)?),
      #[cfg(feature = "directory_record")]
      OutputWrapper::HistoryExport(output) => Ok(output.render_record(index, record)?),
    }
  }

  fn finish(&self, history: &[Arc<HistoryRecord>]) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::AnnotatedImage(output) => Ok(output.finish(history)?),
      #[cfg(feature = "directory_record")]
      OutputWrapper::HistoryExport(output) => Ok(output.finish(history)?),
    }
  }
}
