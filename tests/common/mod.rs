// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// tests/common/mod.rs - 集成测试公共工具
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

#![allow(dead_code)]

use std::sync::Mutex;

use apel_detect::{
  auth::SqliteCredentialStore,
  detection::{BoundingBox, RawDetection},
  history::{ImageOrigin, SourceImage},
  model::{Confidence, Model, Prediction, UnknownClassError},
  session::Session,
};
use image::{Rgb, RgbImage};

#[derive(thiserror::Error, Debug)]
#[error("推理失败: {0}")]
pub struct ScriptedError(pub String);

/// 按顺序返回预先写好的结果，脚本用完后返回空结果
pub struct ScriptedModel {
  classes: Vec<String>,
  script: Mutex<Vec<Result<Vec<RawDetection>, ScriptedError>>>,
}

impl ScriptedModel {
  pub fn new(classes: &[&str]) -> Self {
    Self {
      classes: classes.iter().map(|s| s.to_string()).collect(),
      script: Mutex::new(Vec::new()),
    }
  }

  pub fn then(self, detections: Vec<RawDetection>) -> Self {
    self.script.lock().unwrap().push(Ok(detections));
    self
  }

  pub fn then_fail(self, reason: &str) -> Self {
    self
      .script
      .lock()
      .unwrap()
      .push(Err(ScriptedError(reason.to_string())));
    self
  }
}

impl Model for ScriptedModel {
  type Error = ScriptedError;

  fn predict(&self, image: &RgbImage, confidence: Confidence) -> Result<Prediction, Self::Error> {
    let mut script = self.script.lock().unwrap();
    let next = if script.is_empty() {
      Ok(Vec::new())
    } else {
      script.remove(0)
    };
    let detections = next?
      .into_iter()
      .filter(|d| d.confidence() >= confidence.value())
      .collect();
    Ok(Prediction {
      detections,
      annotated: image.clone(),
    })
  }

  fn class_name_for(&self, class_id: u32) -> Result<String, UnknownClassError> {
    self
      .classes
      .get(class_id as usize)
      .cloned()
      .ok_or(UnknownClassError {
        class_id,
        class_count: self.classes.len(),
      })
  }
}

pub fn raw(class_id: u32, confidence: f32) -> RawDetection {
  let bbox = BoundingBox::new(4.0, 4.0, 20.0, 24.0).unwrap();
  RawDetection::new(class_id, confidence, bbox).unwrap()
}

pub fn leaf_image() -> SourceImage {
  let image = RgbImage::from_pixel(32, 32, Rgb([40, 160, 60]));
  SourceImage::new(image, ImageOrigin::Upload).with_name("leaf.png")
}

pub fn logged_in_session() -> Session {
  let store = SqliteCredentialStore::open_in_memory().unwrap();
  store.add_user("petani", "Pak Tani", "apel123").unwrap();
  Session::login(&store, "petani", "apel123").unwrap()
}

pub fn low_confidence() -> Confidence {
  Confidence::from_percent(25).unwrap()
}
