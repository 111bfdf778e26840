// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/input.rs - 图像输入
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, history::ImageOrigin, history::SourceImage};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "read_image_folder")]
mod read_image_folder;
#[cfg(feature = "read_image_folder")]
pub use self::read_image_folder::{ImageFolderInput, ImageFolderInputError};

/// `?origin=camera` 表示摄像头拍摄的图像，其余视为上传
#[allow(dead_code)]
fn origin_from_url(url: &Url) -> ImageOrigin {
  let camera = url
    .query_pairs()
    .any(|(k, v)| k == "origin" && v.eq_ignore_ascii_case("camera"));
  if camera {
    ImageOrigin::Camera
  } else {
    ImageOrigin::Upload
  }
}

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件读取失败: {0}")]
  ImageFile(#[from] ImageFileInputError),
  #[cfg(feature = "read_image_folder")]
  #[error("图像目录读取失败: {0}")]
  ImageFolder(#[from] ImageFolderInputError),
  #[error("不支持的输入方案: {0}")]
  UnsupportedScheme(String),
}

/// 按 URL 方案选择的图像来源
pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ImageFile(ImageFileInput),
  #[cfg(feature = "read_image_folder")]
  ImageFolder(ImageFolderInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        return Ok(InputWrapper::ImageFile(ImageFileInput::from_url(url)?));
      }
    }
    #[cfg(feature = "read_image_folder")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFolderInput::SCHEME {
        return Ok(InputWrapper::ImageFolder(ImageFolderInput::from_url(url)?));
      }
    }
    Err(InputError::UnsupportedScheme(url.scheme().to_string()))
  }
}

impl Iterator for InputWrapper {
  type Item = Result<SourceImage, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ImageFile(input) => input.next().map(|r| r.map_err(InputError::from)),
      #[cfg(feature = "read_image_folder")]
      InputWrapper::ImageFolder(input) => input.next().map(|r| r.map_err(InputError::from)),
    }
  }
}
