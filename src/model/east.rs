// 该文件是 Zhaozi （找字） 项目的一部分。
// src/model/east.rs - EAST 文本检测后处理
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

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  grid::{CellGeometry, GeometryMap, ScoreMap, ShapeError},
  input::Frame,
  model::{
    DetectResult, Detection, Model,
    nms::{OverlapMetric, UnknownMetric, non_max_suppression},
  },
  query_value,
  tensor::{TensorBundle, TensorError},
};

/// 输出特征图相对输入图像的下采样倍数，由网络结构决定
pub const EAST_STRIDE: f32 = 4.0;
pub const EAST_INPUT_W: u32 = 320;
pub const EAST_INPUT_H: u32 = 320;
pub const EAST_CONFIDENCE_THRESH: f32 = 0.5;
pub const EAST_NMS_THRESH: f32 = 0.3;
pub const EAST_SCORES_TENSOR: &str = "scores";
pub const EAST_GEOMETRY_TENSOR: &str = "geometry";

#[derive(Error, Debug)]
pub enum EastError {
  #[error("输入形状错误: {0}")]
  Shape(#[from] ShapeError),
  #[error("张量错误: {0}")]
  Tensor(#[from] TensorError),
  #[error("阈值 {0} 无效: {1}, 必须位于 [0, 1]")]
  InvalidThreshold(&'static str, f32),
  #[error("输入尺寸无效: {0}x{1}")]
  InvalidInputSize(u32, u32),
  #[error("模型参数错误: {0}")]
  ParamError(String),
  #[error("重叠度量错误: {0}")]
  Metric(#[from] UnknownMetric),
}

/// 推理运行时给出的 EAST 两路输出
#[derive(Debug, Clone)]
pub struct EastOutput {
  pub scores: ScoreMap,
  pub geometry: GeometryMap,
}

impl TryFrom<&TensorBundle> for EastOutput {
  type Error = EastError;

  fn try_from(bundle: &TensorBundle) -> Result<Self, Self::Error> {
    let scores = bundle.require(EAST_SCORES_TENSOR)?.channel(0)?;
    let geometry = bundle
      .require(EAST_GEOMETRY_TENSOR)?
      .channels(GeometryMap::CHANNELS)?;
    let geometry = GeometryMap::try_from(geometry)?;
    ensure_same_shape(&scores, &geometry)?;

    Ok(EastOutput { scores, geometry })
  }
}

fn ensure_same_shape(scores: &ScoreMap, geometry: &GeometryMap) -> Result<(), ShapeError> {
  if geometry.shape() != scores.shape() {
    return Err(ShapeError::Mismatch {
      expected: scores.shape(),
      actual: geometry.shape(),
    });
  }
  Ok(())
}

/// 将单个网格单元还原为轴对齐检测框
///
/// 预测的是旋转矩形，这里只保留其轴对齐近似，宽高为负时原样保留。
pub fn decode_cell(row: usize, col: usize, score: f32, cell: CellGeometry) -> Detection {
  let offset_x = col as f32 * EAST_STRIDE;
  let offset_y = row as f32 * EAST_STRIDE;

  let (sin, cos) = cell.angle.sin_cos();
  let h = cell.dist_top + cell.dist_bottom;
  let w = cell.dist_right + cell.dist_left;

  let end_x = (offset_x + cos * cell.dist_right + sin * cell.dist_bottom).round();
  let end_y = (offset_y - sin * cell.dist_right + cos * cell.dist_bottom).round();

  // 终点四舍五入，起点向零取整；超出 i32 的坐标饱和
  Detection {
    start_x: (end_x - w) as i32,
    start_y: (end_y - h) as i32,
    end_x: end_x as i32,
    end_y: end_y as i32,
    score,
  }
}

fn decode_row<'a>(
  row: usize,
  scores: &'a ScoreMap,
  geometry: &'a GeometryMap,
  confidence: f32,
) -> impl Iterator<Item = Detection> + 'a {
  scores
    .row(row)
    .iter()
    .enumerate()
    // NaN 得分同样跳过
    .filter(move |(_, score)| **score >= confidence)
    .map(move |(col, &score)| decode_cell(row, col, score, geometry.cell(row, col)))
}

/// 解码得分图与几何图，得到 `score >= confidence` 的全部候选框
pub fn decode(
  scores: &ScoreMap,
  geometry: &GeometryMap,
  confidence: f32,
) -> Result<Vec<Detection>, ShapeError> {
  ensure_same_shape(scores, geometry)?;

  #[cfg(feature = "parallel")]
  let detections: Vec<Detection> = (0..scores.rows())
    .into_par_iter()
    .flat_map_iter(|row| decode_row(row, scores, geometry, confidence))
    .collect();

  #[cfg(not(feature = "parallel"))]
  let detections: Vec<Detection> = (0..scores.rows())
    .flat_map(|row| decode_row(row, scores, geometry, confidence))
    .collect();

  debug!(
    "解码 {}x{} 得分图, 得到 {} 个候选框",
    scores.rows(),
    scores.cols(),
    detections.len()
  );
  Ok(detections)
}

#[derive(Debug, Clone)]
pub struct East {
  confidence: f32,
  nms_threshold: f32,
  metric: OverlapMetric,
  input_size: (u32, u32),
}

impl East {
  pub fn confidence(&self) -> f32 {
    self.confidence
  }

  pub fn nms_threshold(&self) -> f32 {
    self.nms_threshold
  }

  pub fn metric(&self) -> OverlapMetric {
    self.metric
  }

  pub fn input_size(&self) -> (u32, u32) {
    self.input_size
  }

  pub fn detect(&self, output: &EastOutput) -> Result<DetectResult, EastError> {
    let candidates = decode(&output.scores, &output.geometry, self.confidence)?;
    let items = non_max_suppression(candidates, self.nms_threshold, self.metric);
    debug!("检测到 {} 个文本框", items.len());

    Ok(DetectResult {
      items: items.into_boxed_slice(),
      input_size: self.input_size,
    })
  }
}

impl Model for East {
  type Input = Frame;
  type Output = DetectResult;
  type Error = EastError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("读取第 {} 帧的 EAST 输出张量", input.index);
    let output = EastOutput::try_from(&input.tensors).inspect_err(|e| {
      error!("第 {} 帧 ({}) 的输出张量无效: {}", input.index, input.name, e);
    })?;
    self.detect(&output)
  }
}

#[derive(Debug, Clone)]
pub struct EastBuilder {
  confidence: f32,
  nms_threshold: f32,
  metric: OverlapMetric,
  input_size: (u32, u32),
}

impl Default for EastBuilder {
  fn default() -> Self {
    Self {
      confidence: EAST_CONFIDENCE_THRESH,
      nms_threshold: EAST_NMS_THRESH,
      metric: OverlapMetric::default(),
      input_size: (EAST_INPUT_W, EAST_INPUT_H),
    }
  }
}

impl FromUrlWithScheme for EastBuilder {
  const SCHEME: &'static str = "east";
}

impl FromUrl for EastBuilder {
  type Error = EastError;

  /// `east:?confidence=0.5&nms=0.3&metric=candidate&width=320&height=320`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(EastError::ParamError(format!(
        "模型地址必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let param = |key: &str| EastError::ParamError(format!("参数 {} 无法解析", key));
    let mut builder = EastBuilder::default();
    if let Some(v) = query_value::<f32>(url, "confidence") {
      builder.confidence = v.map_err(|_| param("confidence"))?;
    }
    if let Some(v) = query_value::<f32>(url, "nms") {
      builder.nms_threshold = v.map_err(|_| param("nms"))?;
    }
    if let Some(v) = query_value::<OverlapMetric>(url, "metric") {
      builder.metric = v?;
    }
    if let Some(v) = query_value::<u32>(url, "width") {
      builder.input_size.0 = v.map_err(|_| param("width"))?;
    }
    if let Some(v) = query_value::<u32>(url, "height") {
      builder.input_size.1 = v.map_err(|_| param("height"))?;
    }

    Ok(builder)
  }
}

fn check_threshold(name: &'static str, value: f32) -> Result<(), EastError> {
  if !(0.0..=1.0).contains(&value) {
    error!("阈值 {} 超出范围: {}", name, value);
    return Err(EastError::InvalidThreshold(name, value));
  }
  Ok(())
}

impl EastBuilder {
  pub fn confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }

  pub fn nms_threshold(mut self, nms_threshold: f32) -> Self {
    self.nms_threshold = nms_threshold;
    self
  }

  pub fn metric(mut self, metric: OverlapMetric) -> Self {
    self.metric = metric;
    self
  }

  pub fn input_size(mut self, width: u32, height: u32) -> Self {
    self.input_size = (width, height);
    self
  }

  pub fn build(self) -> Result<East, EastError> {
    check_threshold("confidence", self.confidence)?;
    check_threshold("nms", self.nms_threshold)?;
    let (width, height) = self.input_size;
    if width == 0 || height == 0 {
      return Err(EastError::InvalidInputSize(width, height));
    }

    info!(
      "EAST 后处理: 置信度阈值 {}, NMS 阈值 {}, 度量 {:?}, 输入尺寸 {}x{}",
      self.confidence, self.nms_threshold, self.metric, width, height
    );
    Ok(East {
      confidence: self.confidence,
      nms_threshold: self.nms_threshold,
      metric: self.metric,
      input_size: self.input_size,
    })
  }
}
