// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use apel_detect::{auth::SqliteCredentialStore, history::HistoryRecord, session::Session};

use args::{AddUserArgs, Cli, Command, DetectArgs};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let cli = Cli::parse();
  match cli.command {
    Command::Detect(args) => detect(args),
    Command::AddUser(args) => add_user(args),
  }
}

fn add_user(args: AddUserArgs) -> Result<()> {
  let store = SqliteCredentialStore::open(&args.db)?;
  store.add_user(&args.username, &args.name, &args.password)?;
  println!("用户已保存: {} ({})", args.username, args.name);
  Ok(())
}

fn detect(args: DetectArgs) -> Result<()> {
  println!("Apel Detect 苹果病害检测");
  println!("======================");
  println!("模型路径: {}", args.model);
  println!("输入来源: {}", args.input);
  if let Some(output) = &args.output {
    println!("输出路径: {}", output);
  }
  println!("置信度阈值: {}%", args.confidence);
  println!();

  let store = SqliteCredentialStore::open(&args.db)?;
  let session = match Session::login(&store, &args.username, &args.password) {
    Ok(session) => session,
    Err(e) => {
      error!("登录失败: {}", e);
      return Err(e.into());
    }
  };
  println!("Welcome, {}", session.display_name());

  // 检测失败不影响会话本身，注销照常进行
  let result = detection::run(&session, &args);
  if let Err(e) = &result {
    error!("检测失败: {:#}", e);
  }

  print_history(&session.history());
  let cleared = session.logout();
  info!("会话结束，共 {} 条记录", cleared);
  result
}

fn print_history(history: &[std::sync::Arc<HistoryRecord>]) {
  println!();
  println!("检测历史");
  if history.is_empty() {
    println!("  暂无检测记录");
    return;
  }
  for (idx, record) in history.iter().enumerate() {
    let labels: Vec<&str> = record.explanations().iter().map(|e| e.label()).collect();
    println!(
      "  记录 {} [{}]: {} 个目标 {:?}",
      idx + 1,
      record.created_at().format("%H:%M:%S"),
      record.detections().len(),
      labels
    );
  }
}

#[cfg(feature = "model_yolo_onnx")]
mod detection {
  use std::sync::LazyLock;

  use anyhow::Result;

  use apel_detect::{
    FromUrl,
    input::InputWrapper,
    lookup::DiseaseLookup,
    model::{Confidence, ModelCache, YoloOnnx, YoloOnnxBuilder},
    output::{OutputWrapper, draw::Draw},
    pipeline::DetectionOutcome,
    session::Session,
    task::{ContinuousTask, DetectionContext, OneShotTask, Task},
  };

  use crate::args::DetectArgs;

  /// 进程内共享，同一路径的模型只加载一次
  static MODELS: LazyLock<ModelCache<YoloOnnx>> = LazyLock::new(ModelCache::new);

  pub fn run(session: &Session, args: &DetectArgs) -> Result<()> {
    let confidence = Confidence::from_percent(args.confidence)?;

    let mut draw = Draw::default();
    if let Some(font) = &args.font {
      draw = draw.with_font_file(font)?;
    }
    let mut builder = YoloOnnxBuilder::from_url(&args.model)?.draw(draw);
    if let Some(labels) = &args.labels {
      builder = builder.class_names(labels.clone());
    }
    let model_path = builder.model_path().to_path_buf();

    println!("正在加载模型...");
    let model = MODELS.get_or_load_with(&model_path, |_| builder.build())?;
    println!("模型加载完成");

    let lookup = DiseaseLookup::load(&args.lookup);
    let input = InputWrapper::from_url(&args.input)?;
    let output = args
      .output
      .as_ref()
      .map(OutputWrapper::from_url)
      .transpose()?;

    let context = DetectionContext {
      session,
      model: &model,
      confidence,
      lookup: lookup.as_ref(),
    };

    let outcomes = if args.input.scheme() == "folder" {
      ContinuousTask::default()
        .with_max_images(args.max_images)
        .with_interrupt_handler(true)
        .run_task(input, &context, &output)?
    } else {
      OneShotTask.run_task(input, &context, &output)?
    };

    println!();
    for outcome in &outcomes {
      print_outcome(outcome);
    }
    Ok(())
  }

  fn print_outcome(outcome: &DetectionOutcome) {
    let record = &outcome.record;
    println!(
      "{}: 检测到 {} 个目标",
      record.source().name.as_deref().unwrap_or("图像"),
      record.detections().len()
    );
    for det in record.detections() {
      let bbox = det.bbox();
      println!(
        "  - {}: {:.2}% at ({:.0}, {:.0}, {:.0}x{:.0})",
        det.label().unwrap_or("?"),
        det.confidence() * 100.0,
        bbox.x1(),
        bbox.y1(),
        bbox.width(),
        bbox.height()
      );
    }
    if !record.explanations().is_empty() {
      println!("病害说明:");
      for entry in record.explanations() {
        println!("  {}: {}", entry.label(), entry.text());
      }
    }
    for warning in &outcome.warnings {
      println!("警告: {}", warning);
    }
  }
}

#[cfg(not(feature = "model_yolo_onnx"))]
mod detection {
  use anyhow::{Result, bail};

  use apel_detect::session::Session;

  use crate::args::DetectArgs;

  pub fn run(_session: &Session, args: &DetectArgs) -> Result<()> {
    bail!(
      "未启用模型后端，无法加载 {}，请使用 --features model_yolo_onnx 重新编译",
      args.model
    )
  }
}
