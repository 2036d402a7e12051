// 该文件是 Zhaozi （找字） 项目的一部分。
// src/tensor.rs - 推理运行时交换的张量
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

use std::{collections::BTreeMap, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::{Grid, ShapeError};

#[derive(Error, Debug)]
pub enum TensorError {
  #[error("缺少张量: {0}")]
  Missing(String),
  #[error("未知的张量布局: {0}")]
  UnknownLayout(String),
  #[error("张量形状错误: {0}")]
  Shape(#[from] ShapeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
  /// TFLite 的默认输出布局
  #[default]
  Nhwc,
  Nchw,
}

impl FromStr for TensorLayout {
  type Err = TensorError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "nhwc" => Ok(TensorLayout::Nhwc),
      "nchw" => Ok(TensorLayout::Nchw),
      other => Err(TensorError::UnknownLayout(other.to_string())),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
  pub shape: Vec<usize>,
  #[serde(default)]
  pub layout: TensorLayout,
  pub data: Vec<f32>,
}

impl Tensor {
  pub fn new(shape: Vec<usize>, layout: TensorLayout, data: Vec<f32>) -> Result<Self, ShapeError> {
    let tensor = Self {
      shape,
      layout,
      data,
    };
    tensor.dims()?;
    Ok(tensor)
  }

  /// 返回 (channels, rows, cols)
  ///
  /// 接受二维 `[h, w]`、三维以及批大小为 1 的四维形状。
  pub fn dims(&self) -> Result<(usize, usize, usize), ShapeError> {
    let inner = match self.shape.as_slice() {
      [h, w] => return self.checked((1, *h, *w)),
      [n, rest @ ..] if rest.len() == 3 => {
        if *n != 1 {
          return Err(ShapeError::Batch(*n));
        }
        rest
      }
      rest if rest.len() == 3 => rest,
      _ => return Err(ShapeError::InvalidDims(self.shape.clone())),
    };

    let dims = match self.layout {
      TensorLayout::Nhwc => (inner[2], inner[0], inner[1]),
      TensorLayout::Nchw => (inner[0], inner[1], inner[2]),
    };
    self.checked(dims)
  }

  fn checked(&self, dims: (usize, usize, usize)) -> Result<(usize, usize, usize), ShapeError> {
    let expected = dims
      .0
      .checked_mul(dims.1)
      .and_then(|n| n.checked_mul(dims.2))
      .ok_or_else(|| ShapeError::InvalidDims(self.shape.clone()))?;
    if expected != self.data.len() {
      return Err(ShapeError::DataLength {
        expected,
        actual: self.data.len(),
      });
    }
    Ok(dims)
  }

  /// 取出单个通道作为网格
  pub fn channel(&self, channel: usize) -> Result<Grid, ShapeError> {
    let (channels, rows, cols) = self.dims()?;
    if channel >= channels {
      return Err(ShapeError::Channels {
        expected: channel + 1,
        actual: channels,
      });
    }

    let data = match self.layout {
      TensorLayout::Nhwc => self
        .data
        .iter()
        .skip(channel)
        .step_by(channels)
        .copied()
        .collect(),
      TensorLayout::Nchw => {
        let plane = rows * cols;
        self.data[channel * plane..(channel + 1) * plane].to_vec()
      }
    };
    Grid::new(rows, cols, data)
  }

  /// 取出全部通道，通道数必须等于 `expected`
  pub fn channels(&self, expected: usize) -> Result<Vec<Grid>, ShapeError> {
    let (channels, _, _) = self.dims()?;
    if channels != expected {
      return Err(ShapeError::Channels {
        expected,
        actual: channels,
      });
    }
    (0..channels).map(|c| self.channel(c)).collect()
  }
}

/// 按名称组织的一组张量，即一次推理的全部输入或输出
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TensorBundle {
  tensors: BTreeMap<String, Tensor>,
}

impl TensorBundle {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
    self.tensors.insert(name.into(), tensor);
  }

  pub fn with(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
    self.insert(name, tensor);
    self
  }

  pub fn get(&self, name: &str) -> Option<&Tensor> {
    self.tensors.get(name)
  }

  pub fn require(&self, name: &str) -> Result<&Tensor, TensorError> {
    self
      .get(name)
      .ok_or_else(|| TensorError::Missing(name.to_string()))
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.tensors.keys().map(String::as_str)
  }
}
