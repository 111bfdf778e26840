// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/session.rs - 用户会话
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

use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
  auth::{AuthenticationError, CredentialStore},
  history::{History, HistoryRecord, SourceImage},
  lookup::{DiseaseLookup, LookupTableError},
  model::{Confidence, Model},
  pipeline::{self, DetectionOutcome},
};

/// 登录成功后创建，注销时销毁。持有本会话的检测历史
pub struct Session {
  username: String,
  display_name: String,
  started_at: DateTime<Utc>,
  history: RwLock<History>,
  inference: Mutex<()>,
}

impl Session {
  pub fn login<S: CredentialStore + ?Sized>(
    store: &S,
    username: &str,
    password: &str,
  ) -> Result<Self, AuthenticationError> {
    let display_name = store.verify(username, password)?;
    info!("用户登录: {} ({})", username, display_name);
    Ok(Self {
      username: username.to_string(),
      display_name,
      started_at: Utc::now(),
      history: RwLock::new(History::new()),
      inference: Mutex::new(()),
    })
  }

  pub fn username(&self) -> &str {
    &self.username
  }

  pub fn display_name(&self) -> &str {
    &self.display_name
  }

  pub fn started_at(&self) -> DateTime<Utc> {
    self.started_at
  }

  fn read_history(&self) -> RwLockReadGuard<'_, History> {
    match self.history.read() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    }
  }

  fn write_history(&self) -> RwLockWriteGuard<'_, History> {
    match self.history.write() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    }
  }

  /// 对一张图像运行检测，并把结果追加到本会话历史
  ///
  /// 同一会话内的推理串行执行。模型错误原样返回，不会追加记录。
  pub fn run_detection<M: Model>(
    &self,
    image: SourceImage,
    model: &M,
    confidence: Confidence,
    lookup: Result<&DiseaseLookup, &LookupTableError>,
  ) -> Result<DetectionOutcome, M::Error> {
    let _inference = match self.inference.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };

    let (record, warnings) = pipeline::annotate(image, model, confidence, lookup)?;
    let record = Arc::new(record);
    let mut history = self.write_history();
    history.append(Arc::clone(&record));
    info!(
      "已追加第 {} 条检测记录: {} 个目标, {} 条说明",
      history.len(),
      record.detections().len(),
      record.explanations().len()
    );

    Ok(DetectionOutcome { record, warnings })
  }

  /// 按时间顺序返回本会话的全部记录
  pub fn history(&self) -> Vec<Arc<HistoryRecord>> {
    self.read_history().all()
  }

  pub fn history_len(&self) -> usize {
    self.read_history().len()
  }

  /// 注销并清空历史，返回注销前的记录数
  pub fn logout(self) -> usize {
    let mut history = self.write_history();
    let count = history.len();
    history.clear();
    info!("用户注销: {}，清除 {} 条记录", self.username, count);
    count
  }
}
