// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/pipeline.rs - 检测与标注流水线
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

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::detection::Detection;
use crate::history::{ExplanationEntry, HistoryRecord, SourceImage};
use crate::lookup::{DiseaseLookup, LookupTableError};
use crate::model::{Confidence, Model, UnknownClassError};

/// 可恢复的问题，每次调用最多报告一次
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
  LookupUnavailable(String),
  UnknownClass(UnknownClassError),
}

impl fmt::Display for PipelineWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PipelineWarning::LookupUnavailable(reason) => write!(f, "病害说明表不可用: {}", reason),
      PipelineWarning::UnknownClass(e) => write!(f, "{}", e),
    }
  }
}

#[derive(Debug, Clone)]
pub struct DetectionOutcome {
  pub record: Arc<HistoryRecord>,
  pub warnings: Vec<PipelineWarning>,
}

/// 运行一次推理并构造历史记录，不写入历史
///
/// 适配器的错误原样返回；未知类别与说明表错误转为警告。
pub fn annotate<M: Model>(
  source: SourceImage,
  model: &M,
  confidence: Confidence,
  lookup: Result<&DiseaseLookup, &LookupTableError>,
) -> Result<(HistoryRecord, Vec<PipelineWarning>), M::Error> {
  let now = std::time::Instant::now();
  let prediction = model.predict(&source.image, confidence)?;
  info!(
    "推理完成，检测到 {} 个目标，耗时: {:.2?}",
    prediction.detections.len(),
    now.elapsed()
  );

  let mut warnings = Vec::new();
  let mut unknown = HashSet::new();
  let mut seen = HashSet::new();
  let mut labels = Vec::new();
  let mut detections = Vec::with_capacity(prediction.detections.len());

  for raw in prediction.detections {
    let label = match model.class_name_for(raw.class_id()) {
      Ok(label) => {
        if seen.insert(label.clone()) {
          labels.push(label.clone());
        }
        Some(label)
      }
      Err(e) => {
        if unknown.insert(e.class_id) {
          warn!("{}，该检测项不参与病害说明", e);
          warnings.push(PipelineWarning::UnknownClass(e));
        }
        None
      }
    };
    let detection: Detection = raw.resolve(label);
    debug!(
      "  - {:?} ({}): {:.2}% at {:?}",
      detection.label(),
      detection.class_id(),
      detection.confidence() * 100.0,
      detection.bbox().as_array()
    );
    detections.push(detection);
  }

  let explanations = match lookup {
    Ok(table) => labels
      .into_iter()
      .map(|label| match table.get(&label) {
        Some(text) => ExplanationEntry::found(label, text),
        None => ExplanationEntry::unavailable(label),
      })
      .collect(),
    Err(e) => {
      warn!("病害说明表不可用，本次记录不含说明: {}", e);
      warnings.push(PipelineWarning::LookupUnavailable(e.to_string()));
      Vec::new()
    }
  };

  let record = HistoryRecord::new(
    source,
    prediction.annotated,
    detections,
    explanations,
    confidence.value(),
  );
  Ok((record, warnings))
}
