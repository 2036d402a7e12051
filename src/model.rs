// 该文件是 Zhaozi （找字） 项目的一部分。
// src/model.rs - 模型后处理
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

use serde::Serialize;

/// 推理结果到业务输出的转换
///
/// 推理本身由外部运行时完成，这里的输入是运行时给出的原始张量。
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 模型输入坐标系下的检测框
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
  pub start_x: i32,
  pub start_y: i32,
  pub end_x: i32,
  pub end_y: i32,
  pub score: f32,
}

impl Detection {
  /// `end - start`，可能为负；以 i64 计算，坐标饱和到 i32 边界时也不会溢出
  pub fn width(&self) -> i64 {
    self.end_x as i64 - self.start_x as i64
  }

  pub fn height(&self) -> i64 {
    self.end_y as i64 - self.start_y as i64
  }

  /// 按比例缩放坐标，向零取整
  pub fn scaled(&self, ratio_x: f32, ratio_y: f32) -> Self {
    Self {
      start_x: (self.start_x as f32 * ratio_x) as i32,
      start_y: (self.start_y as f32 * ratio_y) as i32,
      end_x: (self.end_x as f32 * ratio_x) as i32,
      end_y: (self.end_y as f32 * ratio_y) as i32,
      score: self.score,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
  /// 检测框所在的模型输入尺寸 (width, height)
  pub input_size: (u32, u32),
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  /// 将检测框缩放到 width x height 的图像上
  pub fn scale_to(&self, width: u32, height: u32) -> Vec<Detection> {
    let (ratio_x, ratio_y) = crate::frame::scale_ratio((width, height), self.input_size);
    self
      .items
      .iter()
      .map(|item| item.scaled(ratio_x, ratio_y))
      .collect()
  }
}

pub mod nms;

mod east;
pub use self::east::{
  EAST_CONFIDENCE_THRESH, EAST_GEOMETRY_TENSOR, EAST_INPUT_H, EAST_INPUT_W, EAST_NMS_THRESH,
  EAST_SCORES_TENSOR, EAST_STRIDE, East, EastBuilder, EastError, EastOutput, decode, decode_cell,
};

mod uaed;
pub use self::uaed::{
  EdgeMap, UAED_EDGE_THRESH, UAED_EDGES_TENSOR, UAED_INPUT_H, UAED_INPUT_W, Uaed, UaedBuilder,
  UaedError,
};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scaling_truncates_toward_zero() {
    let detection = Detection {
      start_x: -3,
      start_y: 1,
      end_x: 5,
      end_y: 7,
      score: 0.8,
    };
    let scaled = detection.scaled(1.5, 2.5);
    assert_eq!(
      (scaled.start_x, scaled.start_y, scaled.end_x, scaled.end_y),
      (-4, 2, 7, 17)
    );
    assert_eq!(scaled.score, 0.8);
  }

  #[test]
  fn result_scales_from_input_size() {
    let result = DetectResult {
      items: vec![Detection {
        start_x: 10,
        start_y: 20,
        end_x: 30,
        end_y: 40,
        score: 0.9,
      }]
      .into_boxed_slice(),
      input_size: (320, 320),
    };
    let scaled = result.scale_to(640, 160);
    assert_eq!(
      (scaled[0].start_x, scaled[0].start_y, scaled[0].end_x, scaled[0].end_y),
      (20, 10, 60, 20)
    );
  }
}
