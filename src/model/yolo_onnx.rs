// 该文件是 Apel Detect （苹果病害检测） 项目的一部分。
// src/model/yolo_onnx.rs - 基于 ONNX Runtime 的 YOLO 检测模型
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

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use super::yolo::{YOLO_INPUT_SIZE, YoloDecodeError, decode_output, parse_class_names};
use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Letterbox, RgbNchwFrame},
  model::{
    Confidence, LoadModel, Model, ModelLoadError, Prediction, UnknownClassError, ensure_artifact,
  },
  output::draw::Draw,
  settings::NMS_IOU_THRESHOLD,
};

const YOLO_NUM_INPUTS: usize = 1;
const YOLO_NAMES_METADATA_KEY: &str = "names";

#[derive(Error, Debug)]
pub enum YoloOnnxError {
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("输出解码错误: {0}")]
  DecodeError(#[from] YoloDecodeError),
  #[error("模型没有输出")]
  NoOutput,
  #[error("模型路径必须使用 {0} 方案")]
  SchemeMismatch(&'static str),
}

pub struct YoloOnnx {
  session: Mutex<Session>,
  input_name: String,
  input_size: u32,
  iou_threshold: f32,
  class_names: Vec<String>,
  draw: Draw,
}

pub struct YoloOnnxBuilder {
  model_path: PathBuf,
  input_size: u32,
  iou_threshold: f32,
  class_names: Option<Vec<String>>,
  draw: Draw,
}

impl FromUrlWithScheme for YoloOnnxBuilder {
  const SCHEME: &'static str = "yolo";
}

impl FromUrl for YoloOnnxBuilder {
  type Error = YoloOnnxError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(YoloOnnxError::SchemeMismatch(Self::SCHEME));
    }
    Ok(Self::new(crate::path_from_url(url)))
  }
}

impl YoloOnnxBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      input_size: YOLO_INPUT_SIZE,
      iou_threshold: NMS_IOU_THRESHOLD,
      class_names: None,
      draw: Draw::default(),
    }
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn input_size(mut self, input_size: u32) -> Self {
    self.input_size = input_size;
    self
  }

  pub fn iou_threshold(mut self, iou_threshold: f32) -> Self {
    self.iou_threshold = iou_threshold;
    self
  }

  /// 显式指定类别名称，优先于模型元数据
  pub fn class_names(mut self, class_names: Vec<String>) -> Self {
    self.class_names = Some(class_names);
    self
  }

  pub fn draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn build(self) -> Result<YoloOnnx, ModelLoadError> {
    let path = self.model_path;
    ensure_artifact(&path)?;

    info!("创建 ONNX Runtime 推理会话");
    let session = Session::builder()
      .and_then(|builder| builder.commit_from_file(&path))
      .map_err(|e| {
        error!("模型加载失败: {}", e);
        ModelLoadError::incompatible(&path, e)
      })?;

    if session.inputs.len() != YOLO_NUM_INPUTS {
      return Err(ModelLoadError::incompatible(
        &path,
        format!(
          "预期模型输入数量为 {}, 实际为 {}",
          YOLO_NUM_INPUTS,
          session.inputs.len()
        ),
      ));
    }
    if session.outputs.is_empty() {
      return Err(ModelLoadError::incompatible(&path, "模型没有输出"));
    }
    let input_name = session.inputs[0].name.clone();
    debug!("模型输入: {}", input_name);

    let class_names = match self.class_names {
      Some(names) => names,
      None => session
        .metadata()
        .ok()
        .and_then(|meta| meta.custom(YOLO_NAMES_METADATA_KEY).ok().flatten())
        .and_then(|text| parse_class_names(&text))
        .ok_or_else(|| ModelLoadError::incompatible(&path, "模型元数据中没有类别名称"))?,
    };
    info!("模型类别: {:?}", class_names);

    Ok(YoloOnnx {
      session: Mutex::new(session),
      input_name,
      input_size: self.input_size,
      iou_threshold: self.iou_threshold,
      class_names,
      draw: self.draw,
    })
  }
}

impl LoadModel for YoloOnnx {
  fn load(path: &Path) -> Result<Self, ModelLoadError> {
    YoloOnnxBuilder::new(path).build()
  }
}

impl Model for YoloOnnx {
  type Error = YoloOnnxError;

  fn predict(&self, image: &RgbImage, confidence: Confidence) -> Result<Prediction, Self::Error> {
    let letterbox = Letterbox::new(image.width(), image.height(), self.input_size);
    let frame = RgbNchwFrame::from(&letterbox.apply(image, self.input_size));
    let shape = frame.shape();
    let tensor = Tensor::from_array((shape, frame.into_vec()))?;

    let detections = {
      let mut session = match self.session.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
      };
      debug!("执行模型推理");
      let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;
      if outputs.len() == 0 {
        return Err(YoloOnnxError::NoOutput);
      }
      let (out_shape, data) = outputs[0].try_extract_tensor::<f32>()?;
      let out_shape: Vec<i64> = out_shape.iter().copied().collect();
      debug!("模型输出形状: {:?}", out_shape);
      decode_output(&out_shape, data, confidence, &letterbox, self.iou_threshold)?
    };

    let annotated = self.draw.annotate(image, &detections, |class_id| {
      self
        .class_name_for(class_id)
        .unwrap_or_else(|_| format!("#{}", class_id))
    });

    Ok(Prediction {
      detections,
      annotated,
    })
  }

  fn class_name_for(&self, class_id: u32) -> Result<String, UnknownClassError> {
    self
      .class_names
      .get(class_id as usize)
      .cloned()
      .ok_or(UnknownClassError {
        class_id,
        class_count: self.class_names.len(),
      })
  }
}
