// 该文件是 Zhaozi （找字） 项目的一部分。
// src/model/uaed.rs - UAED 边缘检测后处理
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

use image::{GrayImage, ImageBuffer, Luma, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  grid::{Grid, ShapeError},
  input::Frame,
  model::Model,
  query_value,
  tensor::TensorError,
};

pub const UAED_INPUT_W: u32 = 640;
pub const UAED_INPUT_H: u32 = 480;
pub const UAED_EDGE_THRESH: f32 = 125.0;
pub const UAED_EDGES_TENSOR: &str = "edges";

#[derive(Error, Debug)]
pub enum UaedError {
  #[error("输入形状错误: {0}")]
  Shape(#[from] ShapeError),
  #[error("张量错误: {0}")]
  Tensor(#[from] TensorError),
  #[error("模型参数错误: {0}")]
  ParamError(String),
}

/// 边缘强度图及其二值化阈值
#[derive(Debug, Clone)]
pub struct EdgeMap {
  grid: Grid,
  threshold: f32,
}

impl EdgeMap {
  pub fn new(grid: Grid, threshold: f32) -> Self {
    Self { grid, threshold }
  }

  pub fn grid(&self) -> &Grid {
    &self.grid
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  /// 高于阈值的单元占比
  pub fn edge_ratio(&self) -> f32 {
    let total = self.grid.as_slice().len();
    if total == 0 {
      return 0.0;
    }
    let edges = self
      .grid
      .as_slice()
      .iter()
      .filter(|v| **v > self.threshold)
      .count();
    edges as f32 / total as f32
  }

  /// 双线性缩放到 width x height 后二值化：边缘为黑 (0)，其余为白 (255)
  pub fn mask(&self, width: u32, height: u32) -> GrayImage {
    let (rows, cols) = self.grid.shape();
    if (width, height) == (cols as u32, rows as u32) {
      return GrayImage::from_fn(width, height, |x, y| {
        binarize(self.grid[(y as usize, x as usize)], self.threshold)
      });
    }

    // 浮点图像缩放会截断到 [0, 1]，先做仿射归一化，插值结果不受影响
    let (min, max) = self
      .grid
      .as_slice()
      .iter()
      .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(*v), hi.max(*v))
      });
    let range = max - min;
    if range.is_nan() || range <= 0.0 {
      let value = if min.is_finite() { min } else { 0.0 };
      return GrayImage::from_fn(width, height, |_, _| binarize(value, self.threshold));
    }

    let source: ImageBuffer<Luma<f32>, Vec<f32>> =
      ImageBuffer::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([(self.grid[(y as usize, x as usize)] - min) / range])
      });
    let resized = image::imageops::resize(&source, width, height, FilterType::Triangle);
    let threshold = (self.threshold - min) / range;

    GrayImage::from_fn(width, height, |x, y| {
      binarize(resized.get_pixel(x, y)[0], threshold)
    })
  }
}

fn binarize(value: f32, threshold: f32) -> Luma<u8> {
  if value > threshold { Luma([0]) } else { Luma([255]) }
}

#[derive(Debug, Clone)]
pub struct Uaed {
  threshold: f32,
}

impl Uaed {
  pub fn threshold(&self) -> f32 {
    self.threshold
  }
}

impl Model for Uaed {
  type Input = Frame;
  type Output = EdgeMap;
  type Error = UaedError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let grid = input.tensors.require(UAED_EDGES_TENSOR)?.channel(0)?;
    let edges = EdgeMap::new(grid, self.threshold);
    debug!(
      "第 {} 帧边缘占比: {:.2}%",
      input.index,
      edges.edge_ratio() * 100.0
    );
    Ok(edges)
  }
}

#[derive(Debug, Clone)]
pub struct UaedBuilder {
  threshold: f32,
}

impl Default for UaedBuilder {
  fn default() -> Self {
    Self {
      threshold: UAED_EDGE_THRESH,
    }
  }
}

impl FromUrlWithScheme for UaedBuilder {
  const SCHEME: &'static str = "uaed";
}

impl FromUrl for UaedBuilder {
  type Error = UaedError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(UaedError::ParamError(format!(
        "模型地址必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let mut builder = UaedBuilder::default();
    if let Some(v) = query_value::<f32>(url, "threshold") {
      builder.threshold =
        v.map_err(|_| UaedError::ParamError("参数 threshold 无法解析".to_string()))?;
    }
    Ok(builder)
  }
}

impl UaedBuilder {
  pub fn threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn build(self) -> Result<Uaed, UaedError> {
    if self.threshold.is_nan() {
      return Err(UaedError::ParamError("阈值不能为 NaN".to_string()));
    }
    info!("UAED 后处理: 边缘阈值 {}", self.threshold);
    Ok(Uaed {
      threshold: self.threshold,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mask_marks_strong_edges_black() {
    let grid = Grid::new(1, 3, vec![200.0, 125.0, 10.0]).unwrap();
    let mask = EdgeMap::new(grid, 125.0).mask(3, 1);
    let values: Vec<u8> = mask.pixels().map(|p| p[0]).collect();
    assert_eq!(values, vec![0, 255, 255]);
  }

  #[test]
  fn mask_resizes_to_target() {
    let grid = Grid::filled(4, 4, 255.0);
    let mask = EdgeMap::new(grid, 125.0).mask(8, 6);
    assert_eq!(mask.dimensions(), (8, 6));
    assert!(mask.pixels().all(|p| p[0] == 0));
  }

  #[test]
  fn edge_ratio_counts_cells_above_threshold() {
    let grid = Grid::new(2, 2, vec![0.0, 130.0, 200.0, 125.0]).unwrap();
    assert_eq!(EdgeMap::new(grid, 125.0).edge_ratio(), 0.5);
  }

  #[test]
  fn builder_reads_threshold_from_url() {
    let url = Url::parse("uaed:?threshold=90").unwrap();
    let uaed = UaedBuilder::from_url(&url).unwrap().build().unwrap();
    assert_eq!(uaed.threshold(), 90.0);
  }

  #[test]
  fn infer_requires_edges_tensor() {
    let frame = Frame::from_tensors(0, "empty", crate::tensor::TensorBundle::new());
    let uaed = UaedBuilder::default().build().unwrap();
    assert!(matches!(
      uaed.infer(&frame),
      Err(UaedError::Tensor(TensorError::Missing(_)))
    ));
  }
}
