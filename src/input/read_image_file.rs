// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::ImageReader;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::origin_from_url;
use crate::{
  FromUrl, FromUrlWithScheme,
  history::{ImageOrigin, SourceImage},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("输入方案应为 image，实际为 {0}")]
  SchemeMismatch(String),
  #[error("无法打开图像文件: {0}")]
  Open(#[from] std::io::Error),
  #[error("无法解码图像: {0}")]
  Decode(#[from] image::ImageError),
}

/// 读取单个图像文件，解码后产出一张图像
pub struct ImageFileInput {
  path: PathBuf,
  origin: ImageOrigin,
  consumed: bool,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageFileInputError::SchemeMismatch(url.scheme().to_string()));
    }

    Ok(Self::new(crate::path_from_url(url), origin_from_url(url)))
  }
}

impl ImageFileInput {
  pub fn new(path: impl Into<PathBuf>, origin: ImageOrigin) -> Self {
    Self {
      path: path.into(),
      origin,
      consumed: false,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

/// 解码图像文件并以文件名作为显示名称
pub(super) fn read_source_image(
  path: &Path,
  origin: ImageOrigin,
) -> Result<SourceImage, ImageFileInputError> {
  let image = ImageReader::open(path)?.with_guessed_format()?.decode()?.to_rgb8();
  debug!(
    "读取图像: {} ({}x{})",
    path.display(),
    image.width(),
    image.height()
  );

  let source = SourceImage::new(image, origin);
  Ok(match path.file_name() {
    Some(name) => source.with_name(name.to_string_lossy()),
    None => source,
  })
}

impl Iterator for ImageFileInput {
  type Item = Result<SourceImage, ImageFileInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.consumed {
      return None;
    }
    self.consumed = true;
    Some(read_source_image(&self.path, self.origin))
  }
}
