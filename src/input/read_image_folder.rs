// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/input/read_image_folder.rs - 图像目录输入
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
use std::vec::IntoIter;

use thiserror::Error;
use tracing::info;
use url::Url;

use super::{
  origin_from_url,
  read_image_file::{ImageFileInputError, read_source_image},
};
use crate::{
  FromUrl, FromUrlWithScheme,
  history::{ImageOrigin, SourceImage},
};

/// 与上传表单一致，只接受这些扩展名
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum ImageFolderInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("{path}: {source}")]
  ImageError {
    path: PathBuf,
    #[source]
    source: ImageFileInputError,
  },
}

/// 按文件名顺序逐张读取目录中的图像
pub struct ImageFolderInput {
  files: IntoIter<PathBuf>,
  origin: ImageOrigin,
}

impl FromUrlWithScheme for ImageFolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageFolderInput {
  type Error = ImageFolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageFolderInputError::SchemeMismatch);
    }
    Self::open(crate::path_from_url(url), origin_from_url(url))
  }
}

fn is_image_file(path: &Path) -> bool {
  path.is_file()
    && path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
      .unwrap_or(false)
}

impl ImageFolderInput {
  pub fn open(directory: impl AsRef<Path>, origin: ImageOrigin) -> Result<Self, ImageFolderInputError> {
    let directory = directory.as_ref();
    let mut files = std::fs::read_dir(directory)?
      .map(|entry| entry.map(|e| e.path()))
      .collect::<Result<Vec<_>, _>>()?;
    files.retain(|path| is_image_file(path));
    files.sort();

    info!("目录 {} 中共有 {} 张图像", directory.display(), files.len());
    Ok(Self {
      files: files.into_iter(),
      origin,
    })
  }

  pub fn remaining(&self) -> usize {
    self.files.len()
  }
}

impl Iterator for ImageFolderInput {
  type Item = Result<SourceImage, ImageFolderInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.files.next()?;
    Some(
      read_source_image(&path, self.origin)
        .map_err(|source| ImageFolderInputError::ImageError { path, source }),
    )
  }
}
