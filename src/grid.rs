// 该文件是 Zhaozi （找字） 项目的一部分。
// src/grid.rs - 得分图与几何图
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

use std::ops::Index;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  DataLength { expected: usize, actual: usize },
  #[error("网格形状不一致: 期望 {expected:?}, 实际 {actual:?}")]
  Mismatch {
    expected: (usize, usize),
    actual: (usize, usize),
  },
  #[error("张量维度无效: {0:?}")]
  InvalidDims(Vec<usize>),
  #[error("通道数不匹配: 期望 {expected}, 实际 {actual}")]
  Channels { expected: usize, actual: usize },
  #[error("批大小必须为 1, 实际为 {0}")]
  Batch(usize),
}

/// 行优先存储的二维浮点网格
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
  rows: usize,
  cols: usize,
  data: Box<[f32]>,
}

/// 每个网格单元的置信度
pub type ScoreMap = Grid;

impl Grid {
  pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, ShapeError> {
    let expected = rows
      .checked_mul(cols)
      .ok_or_else(|| ShapeError::InvalidDims(vec![rows, cols]))?;
    if data.len() != expected {
      return Err(ShapeError::DataLength {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      rows,
      cols,
      data: data.into_boxed_slice(),
    })
  }

  #[cfg(test)]
  pub fn filled(rows: usize, cols: usize, value: f32) -> Self {
    Self {
      rows,
      cols,
      data: vec![value; rows * cols].into_boxed_slice(),
    }
  }

  pub fn rows(&self) -> usize {
    self.rows
  }

  pub fn cols(&self) -> usize {
    self.cols
  }

  /// (rows, cols)
  pub fn shape(&self) -> (usize, usize) {
    (self.rows, self.cols)
  }

  #[cfg(test)]
  pub fn get(&self, row: usize, col: usize) -> Option<f32> {
    if row < self.rows && col < self.cols {
      Some(self.data[row * self.cols + col])
    } else {
      None
    }
  }

  pub fn row(&self, row: usize) -> &[f32] {
    &self.data[row * self.cols..(row + 1) * self.cols]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn ensure_shape(&self, expected: (usize, usize)) -> Result<(), ShapeError> {
    if self.shape() != expected {
      return Err(ShapeError::Mismatch {
        expected,
        actual: self.shape(),
      });
    }
    Ok(())
  }
}

impl Index<(usize, usize)> for Grid {
  type Output = f32;

  fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
    &self.data[row * self.cols + col]
  }
}

#[cfg(test)]
impl std::ops::IndexMut<(usize, usize)> for Grid {
  fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
    &mut self.data[row * self.cols + col]
  }
}

/// 单个网格单元预测的几何信息
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CellGeometry {
  pub dist_top: f32,
  pub dist_right: f32,
  pub dist_bottom: f32,
  pub dist_left: f32,
  /// 旋转角（弧度）
  pub angle: f32,
}

/// 几何图：到四条边的距离与旋转角，五个网格形状相同
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryMap {
  dist_top: Grid,
  dist_right: Grid,
  dist_bottom: Grid,
  dist_left: Grid,
  angle: Grid,
}

impl GeometryMap {
  pub const CHANNELS: usize = 5;

  pub fn new(
    dist_top: Grid,
    dist_right: Grid,
    dist_bottom: Grid,
    dist_left: Grid,
    angle: Grid,
  ) -> Result<Self, ShapeError> {
    let shape = dist_top.shape();
    for grid in [&dist_right, &dist_bottom, &dist_left, &angle] {
      grid.ensure_shape(shape)?;
    }

    Ok(Self {
      dist_top,
      dist_right,
      dist_bottom,
      dist_left,
      angle,
    })
  }

  /// 所有单元取相同几何值
  #[cfg(test)]
  pub fn filled(rows: usize, cols: usize, cell: CellGeometry) -> Self {
    Self {
      dist_top: Grid::filled(rows, cols, cell.dist_top),
      dist_right: Grid::filled(rows, cols, cell.dist_right),
      dist_bottom: Grid::filled(rows, cols, cell.dist_bottom),
      dist_left: Grid::filled(rows, cols, cell.dist_left),
      angle: Grid::filled(rows, cols, cell.angle),
    }
  }

  pub fn shape(&self) -> (usize, usize) {
    self.dist_top.shape()
  }

  pub fn cell(&self, row: usize, col: usize) -> CellGeometry {
    CellGeometry {
      dist_top: self.dist_top[(row, col)],
      dist_right: self.dist_right[(row, col)],
      dist_bottom: self.dist_bottom[(row, col)],
      dist_left: self.dist_left[(row, col)],
      angle: self.angle[(row, col)],
    }
  }

  #[cfg(test)]
  pub fn set_cell(&mut self, row: usize, col: usize, cell: CellGeometry) {
    self.dist_top[(row, col)] = cell.dist_top;
    self.dist_right[(row, col)] = cell.dist_right;
    self.dist_bottom[(row, col)] = cell.dist_bottom;
    self.dist_left[(row, col)] = cell.dist_left;
    self.angle[(row, col)] = cell.angle;
  }
}

impl TryFrom<Vec<Grid>> for GeometryMap {
  type Error = ShapeError;

  /// 通道顺序: 上、右、下、左、角度
  fn try_from(grids: Vec<Grid>) -> Result<Self, Self::Error> {
    let [top, right, bottom, left, angle]: [Grid; 5] =
      grids.try_into().map_err(|grids: Vec<Grid>| ShapeError::Channels {
        expected: Self::CHANNELS,
        actual: grids.len(),
      })?;
    Self::new(top, right, bottom, left, angle)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn grid_rejects_wrong_data_length() {
    let err = Grid::new(2, 3, vec![0.0; 5]).unwrap_err();
    assert_eq!(
      err,
      ShapeError::DataLength {
        expected: 6,
        actual: 5
      }
    );
  }

  #[test]
  fn grid_is_row_major() {
    let grid = Grid::new(2, 3, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
    assert_eq!(grid[(1, 0)], 3.0);
    assert_eq!(grid.row(1), &[3.0, 4.0, 5.0]);
    assert_eq!(grid.get(0, 2), Some(2.0));
    assert_eq!(grid.get(2, 0), None);
  }

  #[test]
  fn geometry_rejects_mismatched_channels() {
    let err = GeometryMap::new(
      Grid::filled(2, 2, 0.0),
      Grid::filled(2, 2, 0.0),
      Grid::filled(2, 3, 0.0),
      Grid::filled(2, 2, 0.0),
      Grid::filled(2, 2, 0.0),
    )
    .unwrap_err();
    assert_eq!(
      err,
      ShapeError::Mismatch {
        expected: (2, 2),
        actual: (2, 3)
      }
    );
  }

  #[test]
  fn geometry_from_grids_needs_five_channels() {
    let err = GeometryMap::try_from(vec![Grid::filled(1, 1, 0.0); 4]).unwrap_err();
    assert_eq!(
      err,
      ShapeError::Channels {
        expected: 5,
        actual: 4
      }
    );
  }

  #[test]
  fn set_cell_round_trips_one_cell() {
    let mut geometry = GeometryMap::filled(2, 2, CellGeometry::default());
    let cell = CellGeometry {
      dist_top: 1.0,
      dist_right: 2.0,
      dist_bottom: 3.0,
      dist_left: 4.0,
      angle: 0.5,
    };
    geometry.set_cell(1, 0, cell);
    assert_eq!(geometry.cell(1, 0), cell);
    assert_eq!(geometry.cell(0, 0), CellGeometry::default());
  }
}
