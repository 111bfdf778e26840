// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/lookup.rs - 病害说明表
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

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LookupTableError {
  #[error("说明文件不存在: {0}")]
  Missing(PathBuf),
  #[error("无法读取说明文件 {path}: {source}")]
  Unreadable {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("说明文件格式错误 {path}: {source}")]
  Malformed {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// 标签到病害说明文本的映射，来自 JSON 对象文件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiseaseLookup {
  entries: HashMap<String, String>,
}

impl DiseaseLookup {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, LookupTableError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| {
      if source.kind() == std::io::ErrorKind::NotFound {
        LookupTableError::Missing(path.to_path_buf())
      } else {
        LookupTableError::Unreadable {
          path: path.to_path_buf(),
          source,
        }
      }
    })?;

    let entries: HashMap<String, String> =
      serde_json::from_str(&text).map_err(|source| LookupTableError::Malformed {
        path: path.to_path_buf(),
        source,
      })?;

    debug!("已加载 {} 条病害说明: {}", entries.len(), path.display());
    Ok(Self { entries })
  }

  pub fn get(&self, label: &str) -> Option<&str> {
    self.entries.get(label).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DiseaseLookup {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self {
      entries: iter
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn loads_flat_string_table() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
      file,
      r#"{{"Blotch_Apple": "Bercak coklat pada kulit buah.", "Rot_Apple": "Busuk buah."}}"#
    )
    .unwrap();

    let lookup = DiseaseLookup::load(file.path()).unwrap();
    assert_eq!(lookup.len(), 2);
    assert_eq!(lookup.get("Rot_Apple"), Some("Busuk buah."));
    assert_eq!(lookup.get("Scab_Apple"), None);
  }

  #[test]
  fn missing_file_is_reported_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let err = DiseaseLookup::load(dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, LookupTableError::Missing(_)));
  }

  #[test]
  fn non_string_values_are_malformed() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"scab": 3}}"#).unwrap();
    let err = DiseaseLookup::load(file.path()).unwrap_err();
    assert!(matches!(err, LookupTableError::Malformed { .. }));
  }
}
