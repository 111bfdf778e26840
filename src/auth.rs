// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/auth.rs - 用户凭据存储
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
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use tracing::{debug, info};

mod password;
pub use self::password::{hash_password, verify_password};

const USERS_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS users (
  username TEXT PRIMARY KEY,
  name     TEXT NOT NULL,
  password TEXT NOT NULL
)";

#[derive(Error, Debug)]
pub enum AuthenticationError {
  /// 用户不存在与口令错误不作区分
  #[error("用户名或口令错误")]
  InvalidCredentials,
  #[error("凭据存储错误: {0}")]
  Store(#[from] rusqlite::Error),
}

pub trait CredentialStore {
  /// 校验成功时返回用户的显示名称
  fn verify(&self, username: &str, password: &str) -> Result<String, AuthenticationError>;
}

pub struct SqliteCredentialStore {
  conn: Mutex<Connection>,
}

impl SqliteCredentialStore {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
    let path = path.as_ref();
    let conn = Connection::open(path)?;
    info!("打开用户数据库: {}", path.display());
    Self::with_connection(conn)
  }

  pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self, rusqlite::Error> {
    conn.execute_batch(USERS_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
    match self.conn.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    }
  }

  /// 新增或覆盖一个用户
  pub fn add_user(
    &self,
    username: &str,
    display_name: &str,
    password: &str,
  ) -> Result<(), rusqlite::Error> {
    let hashed = hash_password(password);
    self.connection().execute(
      "INSERT INTO users (username, name, password) VALUES (?1, ?2, ?3)
       ON CONFLICT(username) DO UPDATE SET name = excluded.name, password = excluded.password",
      params![username, display_name, hashed],
    )?;
    info!("已保存用户: {}", username);
    Ok(())
  }
}

impl CredentialStore for SqliteCredentialStore {
  fn verify(&self, username: &str, password: &str) -> Result<String, AuthenticationError> {
    let row: Option<(String, String)> = self
      .connection()
      .query_row(
        "SELECT name, password FROM users WHERE username = ?1",
        params![username],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    match row {
      Some((name, stored)) if verify_password(password, &stored) => Ok(name),
      _ => {
        debug!("登录失败: {}", username);
        Err(AuthenticationError::InvalidCredentials)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store() -> SqliteCredentialStore {
    let store = SqliteCredentialStore::open_in_memory().unwrap();
    store.add_user("budi", "Budi Santoso", "apel123").unwrap();
    store
  }

  #[test]
  fn verifies_exact_match() {
    assert_eq!(store().verify("budi", "apel123").unwrap(), "Budi Santoso");
  }

  #[test]
  fn wrong_password_and_unknown_user_look_the_same() {
    let store = store();
    let wrong = store.verify("budi", "apel12").unwrap_err();
    let unknown = store.verify("sari", "apel123").unwrap_err();
    assert!(matches!(wrong, AuthenticationError::InvalidCredentials));
    assert!(matches!(unknown, AuthenticationError::InvalidCredentials));
    assert_eq!(wrong.to_string(), unknown.to_string());
  }

  #[test]
  fn username_match_is_exact() {
    assert!(store().verify("Budi", "apel123").is_err());
    assert!(store().verify("budi ", "apel123").is_err());
  }

  #[test]
  fn add_user_replaces_existing_password() {
    let store = store();
    store.add_user("budi", "Budi", "baru").unwrap();
    assert!(store.verify("budi", "apel123").is_err());
    assert_eq!(store.verify("budi", "baru").unwrap(), "Budi");
  }

  #[test]
  fn legacy_unsalted_rows_still_verify() {
    let store = SqliteCredentialStore::open_in_memory().unwrap();
    store
      .connection()
      .execute(
        "INSERT INTO users (username, name, password) VALUES (?1, ?2, ?3)",
        params![
          "admin",
          "Administrator",
          "8c6976e5b5410415bde908bd4dee15dfb167a9c873fc4bb8a81f6f2ab448a918"
        ],
      )
      .unwrap();
    assert_eq!(store.verify("admin", "admin").unwrap(), "Administrator");
  }
}
