// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use apel_detect::{
  model::{MAX_CONFIDENCE_PERCENT, MIN_CONFIDENCE_PERCENT},
  settings,
};
use clap::{Args, Parser, Subcommand};
use url::Url;

/// Apel Detect 苹果叶片病害检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 登录后对图像进行病害检测
  Detect(DetectArgs),
  /// 在凭据数据库中添加或更新用户
  AddUser(AddUserArgs),
}

#[derive(Args, Debug)]
pub struct DetectArgs {
  /// 模型地址，例如 yolo:weights/best.onnx
  #[arg(long, env = "APEL_MODEL", value_name = "URL", default_value = settings::DETECTION_MODEL_URL)]
  pub model: Url,

  /// 输入来源
  /// 支持格式:
  /// - 单张图片: image:///path/to/leaf.jpg
  /// - 图片目录: folder:///path/to/leaves
  /// - 追加 ?origin=camera 标记为摄像头拍摄
  #[arg(long, value_name = "URL")]
  pub input: Url,

  /// 输出地址
  /// 支持格式:
  /// - 标注图像: image:///path/to/result.png
  /// - 检测历史目录: folder:///path/to/history（?summary-only 只写 JSON）
  #[arg(long, value_name = "URL")]
  pub output: Option<Url>,

  /// 病害说明 JSON 文件
  #[arg(long, value_name = "FILE", default_value = settings::DISEASE_INFO_FILE)]
  pub lookup: PathBuf,

  /// 凭据数据库
  #[arg(long, env = "APEL_DB", value_name = "FILE", default_value = settings::CREDENTIAL_DATABASE)]
  pub db: PathBuf,

  #[arg(long, short, env = "APEL_USERNAME")]
  pub username: String,

  #[arg(long, short, env = "APEL_PASSWORD", hide_env_values = true)]
  pub password: String,

  /// 置信度阈值（百分比）
  #[arg(
    long,
    value_name = "PERCENT",
    default_value_t = settings::DEFAULT_CONFIDENCE_PERCENT,
    value_parser = clap::value_parser!(u8).range(MIN_CONFIDENCE_PERCENT as i64..=MAX_CONFIDENCE_PERCENT as i64),
  )]
  pub confidence: u8,

  /// 类别名称，逗号分隔，优先于模型元数据
  #[arg(long, value_delimiter = ',', value_name = "NAMES")]
  pub labels: Option<Vec<String>>,

  /// 标注文字使用的字体文件，缺省时只画框
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 最大处理图像数（仅对目录输入有效）
  #[arg(long, value_name = "COUNT")]
  pub max_images: Option<usize>,
}

#[derive(Args, Debug)]
pub struct AddUserArgs {
  #[arg(long, env = "APEL_DB", value_name = "FILE", default_value = settings::CREDENTIAL_DATABASE)]
  pub db: PathBuf,

  #[arg(long, short)]
  pub username: String,

  /// 显示名称
  #[arg(long, short)]
  pub name: String,

  #[arg(long, short, env = "APEL_PASSWORD", hide_env_values = true)]
  pub password: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  #[test]
  fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
  }

  #[test]
  fn default_model_points_at_weights() {
    let cli = Cli::try_parse_from([
      "apel-detect",
      "detect",
      "--input",
      "image:///tmp/leaf.png",
      "-u",
      "admin",
      "-p",
      "admin",
    ])
    .unwrap();
    let Command::Detect(args) = cli.command else {
      panic!("expected detect");
    };
    assert_eq!(args.model.scheme(), "yolo");
    assert_eq!(args.model.path(), settings::DETECTION_MODEL);
  }

  #[test]
  fn confidence_outside_range_is_rejected() {
    let result = Cli::try_parse_from([
      "apel-detect",
      "detect",
      "--input",
      "image:///tmp/leaf.png",
      "-u",
      "admin",
      "-p",
      "admin",
      "--confidence",
      "10",
    ]);
    assert!(result.is_err());
  }

  #[test]
  fn labels_split_on_comma() {
    let cli = Cli::try_parse_from([
      "apel-detect",
      "detect",
      "--input",
      "folder:///tmp/leaves",
      "-u",
      "admin",
      "-p",
      "admin",
      "--labels",
      "scab,rot,rust",
    ])
    .unwrap();
    let Command::Detect(args) = cli.command else {
      panic!("expected detect");
    };
    assert_eq!(
      args.labels,
      Some(vec!["scab".to_string(), "rot".to_string(), "rust".to_string()])
    );
    assert_eq!(args.confidence, settings::DEFAULT_CONFIDENCE_PERCENT);
  }
}
