// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// tests/task.rs - 检测任务与输出测试
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

#![cfg(all(
  feature = "read_image_file",
  feature = "read_image_folder",
  feature = "save_image_file",
  feature = "directory_record"
))]

mod common;

use std::path::Path;

use apel_detect::{
  FromUrl,
  history::ImageOrigin,
  input::{ImageFileInput, ImageFolderInput, InputWrapper},
  lookup::DiseaseLookup,
  output::{DirectoryRecordOutput, OutputWrapper, SaveImageFileOutput},
  task::{ContinuousTask, DetectionContext, OneShotTask, Task},
};
use common::{ScriptedModel, logged_in_session, low_confidence, raw};
use image::{Rgb, RgbImage};
use url::Url;

fn write_leaf(path: &Path) {
  RgbImage::from_pixel(24, 24, Rgb([60, 140, 50]))
    .save(path)
    .unwrap();
}

fn table() -> DiseaseLookup {
  [("scab", "Apple scab info"), ("rot", "Black rot info")]
    .into_iter()
    .collect()
}

#[test]
fn one_shot_task_saves_annotated_image() {
  let dir = tempfile::tempdir().unwrap();
  let input_path = dir.path().join("leaf.png");
  let output_path = dir.path().join("out").join("result.png");
  write_leaf(&input_path);

  let session = logged_in_session();
  let model = ScriptedModel::new(&["scab", "rot"]).then(vec![raw(0, 0.9), raw(1, 0.6)]);
  let table = table();
  let context = DetectionContext {
    session: &session,
    model: &model,
    confidence: low_confidence(),
    lookup: Ok(&table),
  };

  let input = ImageFileInput::new(&input_path, ImageOrigin::Upload);
  let output = SaveImageFileOutput::new(&output_path);
  let outcomes = OneShotTask.run_task(input, &context, &output).unwrap();

  assert_eq!(outcomes.len(), 1);
  assert_eq!(outcomes[0].record.source().name.as_deref(), Some("leaf.png"));
  assert_eq!(outcomes[0].record.explanations().len(), 2);
  assert!(output_path.is_file());
  assert_eq!(session.history_len(), 1);
}

#[test]
fn one_shot_task_reports_missing_input() {
  let dir = tempfile::tempdir().unwrap();
  let session = logged_in_session();
  let model = ScriptedModel::new(&["scab"]);
  let table = table();
  let context = DetectionContext {
    session: &session,
    model: &model,
    confidence: low_confidence(),
    lookup: Ok(&table),
  };

  let input = ImageFileInput::new(dir.path().join("absent.png"), ImageOrigin::Camera);
  let result = OneShotTask.run_task(input, &context, &None::<SaveImageFileOutput>);

  assert!(result.is_err());
  assert_eq!(session.history_len(), 0);
}

#[test]
fn continuous_task_exports_history_and_skips_broken_images() {
  let dir = tempfile::tempdir().unwrap();
  let leaves = dir.path().join("leaves");
  std::fs::create_dir(&leaves).unwrap();
  write_leaf(&leaves.join("a.png"));
  write_leaf(&leaves.join("b.png"));
  std::fs::write(leaves.join("c.png"), b"bukan gambar").unwrap();
  std::fs::write(leaves.join("notes.txt"), b"abaikan").unwrap();
  let export = dir.path().join("history");

  let session = logged_in_session();
  let model = ScriptedModel::new(&["scab", "rot"])
    .then(vec![raw(0, 0.8), raw(0, 0.7)])
    .then(vec![raw(1, 0.9)]);
  let table = table();
  let context = DetectionContext {
    session: &session,
    model: &model,
    confidence: low_confidence(),
    lookup: Ok(&table),
  };

  let input = ImageFolderInput::open(&leaves, ImageOrigin::Upload).unwrap();
  assert_eq!(input.remaining(), 3);
  let output = DirectoryRecordOutput::new(&export);
  let outcomes = ContinuousTask::default()
    .run_task(input, &context, &output)
    .unwrap();

  assert_eq!(outcomes.len(), 2);
  assert_eq!(session.history_len(), 2);
  for stem in ["record-0001", "record-0002"] {
    assert!(export.join(format!("{}-source.png", stem)).is_file());
    assert!(export.join(format!("{}-result.png", stem)).is_file());
    assert!(export.join(format!("{}.json", stem)).is_file());
  }

  let index: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(export.join("history.json")).unwrap()).unwrap();
  let entries = index.as_array().unwrap();
  assert_eq!(entries.len(), 2);
  assert_eq!(entries[0]["index"], 1);
  assert_eq!(entries[0]["file"], "record-0001.json");
  assert_eq!(entries[0]["name"], "a.png");
  assert_eq!(entries[0]["detections"].as_array().unwrap().len(), 2);
  assert_eq!(entries[1]["explanations"][0]["text"], "Black rot info");
}

#[test]
fn continuous_task_respects_max_images() {
  let dir = tempfile::tempdir().unwrap();
  for name in ["a.png", "b.png", "c.png"] {
    write_leaf(&dir.path().join(name));
  }

  let session = logged_in_session();
  let model = ScriptedModel::new(&["scab"]);
  let table = table();
  let context = DetectionContext {
    session: &session,
    model: &model,
    confidence: low_confidence(),
    lookup: Ok(&table),
  };

  let input = ImageFolderInput::open(dir.path(), ImageOrigin::Upload).unwrap();
  let outcomes = ContinuousTask::default()
    .with_max_images(Some(2))
    .run_task(input, &context, &None::<DirectoryRecordOutput>)
    .unwrap();

  assert_eq!(outcomes.len(), 2);
  assert_eq!(session.history_len(), 2);
}

#[test]
fn summary_only_export_skips_images() {
  let dir = tempfile::tempdir().unwrap();
  let leaf = dir.path().join("leaf.png");
  write_leaf(&leaf);
  let export = dir.path().join("export");

  let input_url = Url::parse(&format!("image://{}?origin=camera", leaf.display())).unwrap();
  let output_url = Url::parse(&format!("folder://{}?summary-only", export.display())).unwrap();
  let input = InputWrapper::from_url(&input_url).unwrap();
  let output = OutputWrapper::from_url(&output_url).unwrap();

  let session = logged_in_session();
  let model = ScriptedModel::new(&["scab"]).then(vec![raw(0, 0.8)]);
  let lookup = DiseaseLookup::load(dir.path().join("missing.json"));
  let context = DetectionContext {
    session: &session,
    model: &model,
    confidence: low_confidence(),
    lookup: lookup.as_ref(),
  };

  let outcomes = OneShotTask.run_task(input, &context, &output).unwrap();
  assert_eq!(outcomes[0].record.source().origin, ImageOrigin::Camera);
  assert_eq!(outcomes[0].warnings.len(), 1);

  assert!(export.join("record-0001.json").is_file());
  assert!(!export.join("record-0001-source.png").exists());
  assert!(export.join("history.json").is_file());
}

#[test]
fn skipped_images_do_not_count_toward_max_images() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("a.png"), b"rusak").unwrap();
  for name in ["b.png", "c.png", "d.png"] {
    write_leaf(&dir.path().join(name));
  }

  let session = logged_in_session();
  let model = ScriptedModel::new(&["scab"]);
  let table = table();
  let context = DetectionContext {
    session: &session,
    model: &model,
    confidence: low_confidence(),
    lookup: Ok(&table),
  };

  let input = ImageFolderInput::open(dir.path(), ImageOrigin::Upload).unwrap();
  let outcomes = ContinuousTask::default()
    .with_max_images(Some(2))
    .run_task(input, &context, &None::<DirectoryRecordOutput>)
    .unwrap();

  let names: Vec<Option<&str>> = outcomes
    .iter()
    .map(|o| o.record.source().name.as_deref())
    .collect();
  assert_eq!(names, vec![Some("b.png"), Some("c.png")]);
  assert_eq!(session.history_len(), 2);
}

#[test]
fn output_paths_with_spaces_are_written_verbatim() {
  let dir = tempfile::tempdir().unwrap();
  let leaf = dir.path().join("yak apple.png");
  write_leaf(&leaf);
  let result = dir.path().join("hasil deteksi").join("yak apple result.png");
  let export = dir.path().join("riwayat apel");

  let input_url = Url::parse(&format!("image://{}", leaf.display())).unwrap();
  let result_url = Url::parse(&format!("image://{}", result.display())).unwrap();
  let export_url = Url::parse(&format!("folder://{}", export.display())).unwrap();

  let session = logged_in_session();
  let model = ScriptedModel::new(&["scab"])
    .then(vec![raw(0, 0.8)])
    .then(vec![raw(0, 0.7)]);
  let table = table();
  let context = DetectionContext {
    session: &session,
    model: &model,
    confidence: low_confidence(),
    lookup: Ok(&table),
  };

  let image_output = OutputWrapper::from_url(&result_url).unwrap();
  OneShotTask
    .run_task(InputWrapper::from_url(&input_url).unwrap(), &context, &image_output)
    .unwrap();
  assert!(result.is_file());

  let export_output = OutputWrapper::from_url(&export_url).unwrap();
  OneShotTask
    .run_task(InputWrapper::from_url(&input_url).unwrap(), &context, &export_output)
    .unwrap();
  assert!(export.join("record-0002.json").is_file());
  assert!(export.join("history.json").is_file());
}
