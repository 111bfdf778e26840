// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/model/yolo.rs - YOLO 输出解码
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
use tracing::debug;

use crate::{
  detection::{BoundingBox, RawDetection, non_max_suppression},
  frame::Letterbox,
  model::Confidence,
};

pub const YOLO_INPUT_SIZE: u32 = 640;
pub const YOLO_MAX_DETECTIONS: usize = 300;
const YOLO_BOX_DIMS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum YoloDecodeError {
  #[error("输出形状不符合 [1, 4 + nc, anchors]: {0:?}")]
  UnexpectedShape(Vec<i64>),
  #[error("输出长度 {actual} 与形状要求的 {expected} 不一致")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 解码 YOLOv8/YOLO11 检测头输出 `[1, 4 + nc, anchors]`
///
/// 每个锚点取得分最高的类别，低于阈值的丢弃，坐标映射回原图后做 NMS。
pub fn decode_output(
  shape: &[i64],
  data: &[f32],
  confidence: Confidence,
  letterbox: &Letterbox,
  iou_threshold: f32,
) -> Result<Vec<RawDetection>, YoloDecodeError> {
  let (channels, anchors) = match shape {
    [1, c, n] if *c > YOLO_BOX_DIMS as i64 && *n >= 0 => (*c as usize, *n as usize),
    _ => return Err(YoloDecodeError::UnexpectedShape(shape.to_vec())),
  };
  if data.len() != channels * anchors {
    return Err(YoloDecodeError::LengthMismatch {
      expected: channels * anchors,
      actual: data.len(),
    });
  }

  let class_num = channels - YOLO_BOX_DIMS;
  let mut candidates = Vec::new();

  for i in 0..anchors {
    let (class_id, score) = (0..class_num)
      .map(|c| (c, data[(YOLO_BOX_DIMS + c) * anchors + i]))
      .fold((0usize, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

    if score < confidence.value() {
      continue;
    }

    let cx = data[i];
    let cy = data[anchors + i];
    let w = data[2 * anchors + i];
    let h = data[3 * anchors + i];
    let [x1, y1, x2, y2] = letterbox.unmap([cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]);

    // 裁剪后退化的框直接丢弃
    let Ok(bbox) = BoundingBox::new(x1, y1, x2, y2) else {
      continue;
    };
    if let Ok(item) = RawDetection::new(class_id as u32, score.min(1.0), bbox) {
      candidates.push(item);
    }
  }

  debug!("阈值过滤后候选框: {}", candidates.len());
  Ok(non_max_suppression(candidates, iou_threshold, YOLO_MAX_DETECTIONS))
}

/// 解析导出模型元数据中的类别表，例如 `{0: 'Blotch_Apple', 1: 'Rot_Apple'}`
pub fn parse_class_names(text: &str) -> Option<Vec<String>> {
  let inner = text.trim().strip_prefix('{')?.strip_suffix('}')?;
  let mut entries = Vec::new();

  for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
    let (index, name) = part.split_once(':')?;
    let index: usize = index.trim().parse().ok()?;
    let name = name.trim().trim_matches(|c| c == '\'' || c == '"');
    entries.push((index, name.to_string()));
  }

  entries.sort_by_key(|(index, _)| *index);
  // 索引必须从 0 连续
  if entries.iter().enumerate().any(|(i, (index, _))| i != *index) {
    return None;
  }
  Some(entries.into_iter().map(|(_, name)| name).collect())
}

#[cfg(test)]
mod tests {
  use super::*;

  /// 构造 [1, 4 + nc, anchors] 的输出，每个锚点给一个类别得分
  fn output(anchors: &[([f32; 4], usize, f32)], class_num: usize) -> (Vec<i64>, Vec<f32>) {
    let n = anchors.len();
    let channels = 4 + class_num;
    let mut data = vec![0f32; channels * n];
    for (i, (bbox, class_id, score)) in anchors.iter().enumerate() {
      for k in 0..4 {
        data[k * n + i] = bbox[k];
      }
      data[(4 + class_id) * n + i] = *score;
    }
    (vec![1, channels as i64, n as i64], data)
  }

  #[test]
  fn decodes_and_maps_back_to_source_pixels() {
    let lb = Letterbox::new(1280, 640, 640);
    let (shape, data) = output(
      &[
        ([100.0, 320.0, 40.0, 40.0], 1, 0.9),
        ([300.0, 320.0, 40.0, 40.0], 0, 0.1),
      ],
      2,
    );

    let items = decode_output(&shape, &data, Confidence::new(0.25).unwrap(), &lb, 0.7).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].class_id(), 1);
    assert_eq!(items[0].bbox().as_array(), [160.0, 280.0, 240.0, 360.0]);
  }

  #[test]
  fn overlapping_boxes_of_same_class_are_merged() {
    let lb = Letterbox::new(640, 640, 640);
    let (shape, data) = output(
      &[
        ([100.0, 100.0, 50.0, 50.0], 0, 0.8),
        ([101.0, 100.0, 50.0, 50.0], 0, 0.6),
        ([101.0, 100.0, 50.0, 50.0], 1, 0.6),
      ],
      2,
    );
    let items = decode_output(&shape, &data, Confidence::new(0.25).unwrap(), &lb, 0.7).unwrap();
    assert_eq!(items.len(), 2);
  }

  #[test]
  fn rejects_unexpected_shapes() {
    let lb = Letterbox::new(640, 640, 640);
    let conf = Confidence::default();
    assert!(matches!(
      decode_output(&[1, 84], &[], conf, &lb, 0.7),
      Err(YoloDecodeError::UnexpectedShape(_))
    ));
    assert!(matches!(
      decode_output(&[1, 6, 2], &[0.0; 5], conf, &lb, 0.7),
      Err(YoloDecodeError::LengthMismatch { .. })
    ));
  }

  #[test]
  fn parses_exported_class_names() {
    let names = parse_class_names("{0: 'Blotch_Apple', 1: 'Normal_Apple', 2: \"Rot_Apple\"}");
    assert_eq!(
      names,
      Some(vec![
        "Blotch_Apple".to_string(),
        "Normal_Apple".to_string(),
        "Rot_Apple".to_string()
      ])
    );
    assert_eq!(parse_class_names("{1: 'a'}"), None);
    assert_eq!(parse_class_names("[0, 1]"), None);
  }
}
