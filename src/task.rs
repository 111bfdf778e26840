// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/task.rs - 检测任务
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

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, warn};

use crate::{
  history::SourceImage,
  lookup::{DiseaseLookup, LookupTableError},
  model::{Confidence, Model},
  output::Render,
  pipeline::DetectionOutcome,
  session::Session,
};

/// 一次任务共用的检测参数
pub struct DetectionContext<'a, M> {
  pub session: &'a Session,
  pub model: &'a M,
  pub confidence: Confidence,
  pub lookup: Result<&'a DiseaseLookup, &'a LookupTableError>,
}

impl<M: Model> DetectionContext<'_, M> {
  fn detect(&self, image: SourceImage) -> Result<DetectionOutcome, M::Error> {
    self
      .session
      .run_detection(image, self.model, self.confidence, self.lookup)
  }
}

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(
    self,
    input: I,
    context: &DetectionContext<'_, M>,
    output: &O,
  ) -> Result<Vec<DetectionOutcome>, Self::Error>;
}

/// 只处理第一张输入图像
pub struct OneShotTask;

impl<
  IE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<SourceImage, IE>>,
  M: Model,
  O: Render<Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    context: &DetectionContext<'_, M>,
    output: &O,
  ) -> Result<Vec<DetectionOutcome>, Self::Error> {
    info!("开始任务...");
    let image = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))??;
    info!("输入图像获取成功，开始检测...");
    let outcome = context.detect(image)?;
    output.render_record(context.session.history_len(), &outcome.record)?;
    output.finish(&context.session.history())?;
    info!("任务完成");
    Ok(vec![outcome])
  }
}

/// 依次处理全部输入图像，可限制数量，收到 Ctrl-C 后在当前图像完成后退出
#[derive(Default, Debug)]
pub struct ContinuousTask {
  max_images: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_max_images(mut self, max_images: Option<usize>) -> Self {
    self.max_images = max_images;
    self
  }

  pub fn with_interrupt_handler(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }
}

impl<
  IE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<SourceImage, IE>>,
  M: Model,
  O: Render<Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    context: &DetectionContext<'_, M>,
    output: &O,
  ) -> Result<Vec<DetectionOutcome>, Self::Error> {
    info!("开始任务...");
    let interrupted = Arc::new(AtomicBool::new(false));
    if self.handle_interrupt {
      let flag = Arc::clone(&interrupted);
      ctrlc::set_handler(move || {
        info!("收到中断信号，当前图像完成后退出...");
        flag.store(true, Ordering::SeqCst);
      })?;
    }

    // 只统计成功检测的图像，读取失败而跳过的不计入上限
    let reached = |processed: usize| self.max_images.is_some_and(|n| processed >= n);
    let mut outcomes = Vec::new();
    for (i, image) in input.enumerate() {
      if reached(outcomes.len()) {
        break;
      }

      let image = match image {
        Ok(image) => image,
        Err(e) => {
          error!("第 {} 张图像读取失败，已跳过: {}", i + 1, e);
          continue;
        }
      };

      info!("处理第 {} 张图像", i + 1);
      let outcome = context.detect(image)?;
      output.render_record(context.session.history_len(), &outcome.record)?;
      outcomes.push(outcome);

      if reached(outcomes.len()) {
        info!("已检测 {} 张图像，达到指定数量，退出任务循环", outcomes.len());
        break;
      }

      if interrupted.load(Ordering::SeqCst) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    output.finish(&context.session.history())?;
    info!("任务完成，共处理 {} 张图像", outcomes.len());
    Ok(outcomes)
  }
}
