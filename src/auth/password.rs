// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/auth/password.rs - 口令摘要
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

use rand::RngCore;
use sha2::{Digest, Sha256};

const HASH_SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;
const DIGEST_HEX_LEN: usize = 64;

/// 生成带随机盐的口令摘要，格式为 `sha256$<salt>$<digest>`
pub fn hash_password(password: &str) -> String {
  let mut salt = [0u8; SALT_LEN];
  rand::thread_rng().fill_bytes(&mut salt);
  hash_with_salt(password, &salt)
}

fn hash_with_salt(password: &str, salt: &[u8]) -> String {
  format!(
    "{}${}${}",
    HASH_SCHEME,
    hex::encode(salt),
    hex::encode(salted_digest(password, salt))
  )
}

fn salted_digest(password: &str, salt: &[u8]) -> Vec<u8> {
  let mut hasher = Sha256::new();
  hasher.update(salt);
  hasher.update(password.as_bytes());
  hasher.finalize().to_vec()
}

/// 校验口令。同时接受旧格式：不带盐的 SHA-256 十六进制摘要
pub fn verify_password(password: &str, stored: &str) -> bool {
  let mut parts = stored.split('$');
  match (parts.next(), parts.next(), parts.next(), parts.next()) {
    (Some(HASH_SCHEME), Some(salt), Some(digest), None) => {
      match (hex::decode(salt), hex::decode(digest)) {
        (Ok(salt), Ok(expected)) => constant_time_eq(&salted_digest(password, &salt), &expected),
        _ => false,
      }
    }
    (Some(legacy), None, None, None) if legacy.len() == DIGEST_HEX_LEN => match hex::decode(legacy) {
      Ok(expected) => constant_time_eq(Sha256::digest(password.as_bytes()).as_slice(), &expected),
      Err(_) => false,
    },
    _ => false,
  }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
  if a.len() != b.len() {
    return false;
  }
  a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
