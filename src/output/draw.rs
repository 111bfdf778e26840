// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::debug;

use crate::detection::RawDetection;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: u32 = 2;
const PALETTE_SIZE: usize = 20;

#[derive(Error, Debug)]
pub enum FontLoadError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效")]
  InvalidFont,
}

/// 边界框绘制器。没有字体时只绘制边框和标签底色
pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  palette: Vec<Rgb<u8>>,
}

impl Default for Draw {
  fn default() -> Self {
    let palette = (0..PALETTE_SIZE)
      .map(|i| hsv_to_rgb((i as f32 / PALETTE_SIZE as f32) * 360.0, 0.8, 0.9))
      .collect();

    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      palette,
    }
  }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = match h {
    h if h < 60.0 => (c, x, 0.0),
    h if h < 120.0 => (x, c, 0.0),
    h if h < 180.0 => (0.0, c, x),
    h if h < 240.0 => (0.0, x, c),
    h if h < 300.0 => (x, 0.0, c),
    _ => (c, 0.0, x),
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

impl Draw {
  pub fn with_font(mut self, font: FontVec) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self, FontLoadError> {
    let data = std::fs::read(path.as_ref())?;
    let font = FontVec::try_from_vec(data).map_err(|_| FontLoadError::InvalidFont)?;
    debug!("已加载标签字体: {}", path.as_ref().display());
    Ok(self.with_font(font))
  }

  pub fn color_for(&self, class_id: u32) -> Rgb<u8> {
    self.palette[class_id as usize % self.palette.len()]
  }

  /// 在原图副本上绘制全部检测框，`label_of` 负责把类别索引转为文字
  pub fn annotate<F>(&self, image: &RgbImage, detections: &[RawDetection], label_of: F) -> RgbImage
  where
    F: Fn(u32) -> String,
  {
    let mut canvas = image.clone();
    for detection in detections {
      let label = format!("{} {:.2}", label_of(detection.class_id()), detection.confidence());
      self.draw_bbox_with_label(
        &mut canvas,
        detection.bbox().as_array(),
        &label,
        self.color_for(detection.class_id()),
      );
    }
    canvas
  }

  // bbox 为像素坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label(&self, image: &mut RgbImage, bbox: [f32; 4], label: &str, color: Rgb<u8>) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = (bbox[2].ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox[3].ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    // 逐层向内绘制，边框加粗
    for t in 0..BOX_THICKNESS as i32 {
      let width = (x_max - x_min + 1 - 2 * t).max(0) as u32;
      let height = (y_max - y_min + 1 - 2 * t).max(0) as u32;
      if width == 0 || height == 0 {
        break;
      }
      draw_hollow_rect_mut(image, Rect::at(x_min + t, y_min + t).of_size(width, height), color);
    }

    // 标签放在边框上方，空间不足时贴着图像上沿
    let text_width = (label.chars().count() as f32 * self.label_char_width) as i32;
    let label_x = x_min;
    let label_y = (y_min - self.label_text_height).max(0);
    let label_width = text_width.min(w - label_x).max(0) as u32;
    let label_height = self.label_text_height.min(h - label_y).max(0) as u32;

    if label_width == 0 || label_height == 0 {
      return;
    }

    let rect = Rect::at(label_x, label_y).of_size(label_width, label_height);
    draw_filled_rect_mut(image, rect, color);

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        Rgb([255u8, 255u8, 255u8]),
        label_x,
        label_y + self.label_text_vertical_padding,
        PxScale::from(self.font_size),
        font,
        label,
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::BoundingBox;

  fn detection(class_id: u32, bbox: [f32; 4]) -> RawDetection {
    let bbox = BoundingBox::new(bbox[0], bbox[1], bbox[2], bbox[3]).unwrap();
    RawDetection::new(class_id, 0.9, bbox).unwrap()
  }

  #[test]
  fn draws_box_edges_in_class_color() {
    let draw = Draw::default();
    let image = RgbImage::new(100, 100);
    let out = draw.annotate(&image, &[detection(3, [40.0, 50.0, 80.0, 90.0])], |_| "scab".into());
    let color = draw.color_for(3);

    assert_eq!(out.get_pixel(40, 70), &color);
    assert_eq!(out.get_pixel(41, 70), &color);
    assert_eq!(out.get_pixel(80, 70), &color);
    assert_eq!(out.get_pixel(60, 70), &Rgb([0, 0, 0]));
    // 原图不受影响
    assert_eq!(image.get_pixel(40, 70), &Rgb([0, 0, 0]));
  }

  #[test]
  fn boxes_outside_the_image_are_skipped() {
    let draw = Draw::default();
    let image = RgbImage::new(10, 10);
    let out = draw.annotate(&image, &[detection(0, [20.0, 20.0, 30.0, 30.0])], |_| "x".into());
    assert_eq!(out, image);
  }

  #[test]
  fn palette_wraps_around() {
    let draw = Draw::default();
    assert_eq!(draw.color_for(1), draw.color_for(1 + PALETTE_SIZE as u32));
  }
}
