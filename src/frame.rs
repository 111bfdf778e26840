// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/frame.rs - 模型输入帧与 letterbox 变换
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

use image::{Rgb, RgbImage, imageops::FilterType};

const RGB_CHANNELS: usize = 3;
const PAD_VALUE: u8 = 114;

/// 归一化到 [0, 1] 的 NCHW 浮点帧
#[derive(Debug, Clone)]
pub struct RgbNchwFrame {
  data: Box<[f32]>,
  width: usize,
  height: usize,
}

impl From<&RgbImage> for RgbNchwFrame {
  fn from(image: &RgbImage) -> Self {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let plane = width * height;
    let mut data = vec![0f32; RGB_CHANNELS * plane];

    for (x, y, pixel) in image.enumerate_pixels() {
      let idx = y as usize * width + x as usize;
      for c in 0..RGB_CHANNELS {
        data[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }

    Self {
      data: data.into_boxed_slice(),
      width,
      height,
    }
  }
}

impl RgbNchwFrame {
  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// 带批维度的形状 [1, C, H, W]
  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.height, self.width]
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }

  pub fn into_vec(self) -> Vec<f32> {
    self.data.into_vec()
  }
}

/// 等比缩放并居中填充后的几何参数，用于把模型坐标映射回原图
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  scale: f32,
  pad_x: f32,
  pad_y: f32,
  source_width: u32,
  source_height: u32,
}

impl Letterbox {
  pub fn new(source_width: u32, source_height: u32, target: u32) -> Self {
    let scale = (target as f32 / source_width as f32).min(target as f32 / source_height as f32);
    let resized_w = (source_width as f32 * scale).round();
    let resized_h = (source_height as f32 * scale).round();
    Self {
      scale,
      pad_x: ((target as f32 - resized_w) / 2.0).floor(),
      pad_y: ((target as f32 - resized_h) / 2.0).floor(),
      source_width,
      source_height,
    }
  }

  pub fn scale(&self) -> f32 {
    self.scale
  }

  pub fn padding(&self) -> (f32, f32) {
    (self.pad_x, self.pad_y)
  }

  /// 生成模型输入图像：缩放到 `target` 正方形内，空白部分填充灰色
  pub fn apply(&self, image: &RgbImage, target: u32) -> RgbImage {
    let resized_w = ((self.source_width as f32 * self.scale).round() as u32).clamp(1, target);
    let resized_h = ((self.source_height as f32 * self.scale).round() as u32).clamp(1, target);
    let resized = image::imageops::resize(image, resized_w, resized_h, FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(target, target, Rgb([PAD_VALUE; 3]));
    image::imageops::replace(&mut canvas, &resized, self.pad_x as i64, self.pad_y as i64);
    canvas
  }

  /// 把模型输入坐标系下的 [x1, y1, x2, y2] 映射回原图并裁剪到图像范围内
  pub fn unmap(&self, bbox: [f32; 4]) -> [f32; 4] {
    let w = self.source_width as f32;
    let h = self.source_height as f32;
    [
      ((bbox[0] - self.pad_x) / self.scale).clamp(0.0, w),
      ((bbox[1] - self.pad_y) / self.scale).clamp(0.0, h),
      ((bbox[2] - self.pad_x) / self.scale).clamp(0.0, w),
      ((bbox[3] - self.pad_y) / self.scale).clamp(0.0, h),
    ]
  }
}
