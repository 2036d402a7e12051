// 该文件是 Zhaozi （找字） 项目的一部分。
// src/frame.rs - 模型输入帧（预处理）
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


use image::{RgbImage, imageops::FilterType};

use crate::{
  model::{EAST_INPUT_H, EAST_INPUT_W, UAED_INPUT_H, UAED_INPUT_W},
  tensor::{Tensor, TensorLayout},
};

const CHANNELS: usize = 3;

/// EAST 训练时使用的均值，按 R、G、B 给出
pub const EAST_MEAN_RGB: [f32; 3] = [123.68, 116.779, 103.939];

pub trait FrameFormat {
  fn tensor_layout(&self) -> TensorLayout;
}

fn resize<const W: u32, const H: u32>(image: &RgbImage) -> RgbImage {
  if image.dimensions() == (W, H) {
    return image.clone();
  }
  image::imageops::resize(image, W, H, FilterType::Triangle)
}

/// NHWC 排列的浮点帧
#[derive(Debug, Clone)]
pub struct NhwcTensorFrame<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

impl<const W: u32, const H: u32> FrameFormat for NhwcTensorFrame<W, H> {
  fn tensor_layout(&self) -> TensorLayout {
    TensorLayout::Nhwc
  }
}

impl<const W: u32, const H: u32> NhwcTensorFrame<W, H> {
  /// 缩放到 W x H，按 B、G、R 顺序排列并减去对应通道的均值
  ///
  /// 网络按 OpenCV 读入的 BGR 图像训练。
  pub fn bgr_mean_subtracted(image: &RgbImage, mean_rgb: [f32; 3]) -> Self {
    let resized = resize::<W, H>(image);
    let data = resized
      .pixels()
      .flat_map(|pixel| {
        let [r, g, b] = pixel.0;
        [
          b as f32 - mean_rgb[2],
          g as f32 - mean_rgb[1],
          r as f32 - mean_rgb[0],
        ]
      })
      .collect::<Vec<_>>();

    Self {
      data: data.into_boxed_slice(),
    }
  }

  #[cfg(test)]
  pub fn as_nhwc(&self) -> &[f32] {
    &self.data
  }

  pub fn into_tensor(self) -> Tensor {
    let layout = self.tensor_layout();
    Tensor {
      shape: vec![1, H as usize, W as usize, CHANNELS],
      layout,
      data: self.data.into_vec(),
    }
  }
}

/// NCHW 排列的浮点 RGB 帧
#[derive(Debug, Clone)]
pub struct NchwTensorFrame<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

impl<const W: u32, const H: u32> FrameFormat for NchwTensorFrame<W, H> {
  fn tensor_layout(&self) -> TensorLayout {
    TensorLayout::Nchw
  }
}

impl<const W: u32, const H: u32> NchwTensorFrame<W, H> {
  /// 缩放到 W x H 后归一化到 [0, 1]
  pub fn unit_scaled(image: &RgbImage) -> Self {
    let resized = resize::<W, H>(image);
    let plane = W as usize * H as usize;
    let mut data = vec![0f32; plane * CHANNELS];

    for (idx, pixel) in resized.pixels().enumerate() {
      for c in 0..CHANNELS {
        data[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }

    Self {
      data: data.into_boxed_slice(),
    }
  }

  #[cfg(test)]
  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }

  pub fn into_tensor(self) -> Tensor {
    let layout = self.tensor_layout();
    Tensor {
      shape: vec![1, CHANNELS, H as usize, W as usize],
      layout,
      data: self.data.into_vec(),
    }
  }
}

pub type EastInputFrame = NhwcTensorFrame<{ EAST_INPUT_W }, { EAST_INPUT_H }>;
pub type UaedInputFrame = NchwTensorFrame<{ UAED_INPUT_W }, { UAED_INPUT_H }>;

/// 原图相对模型输入的缩放比例 (rW, rH)
pub fn scale_ratio(original: (u32, u32), input: (u32, u32)) -> (f32, f32) {
  (
    original.0 as f32 / input.0 as f32,
    original.1 as f32 / input.1 as f32,
  )
}

#[cfg(test)]
mod tests {
  use image::Rgb;

  use super::*;

  #[test]
  fn east_frame_is_bgr_minus_mean() {
    let image = RgbImage::from_pixel(2, 2, Rgb([200, 100, 50]));
    let frame = NhwcTensorFrame::<2, 2>::bgr_mean_subtracted(&image, EAST_MEAN_RGB);
    let first = &frame.as_nhwc()[..3];
    // B: 50 - 103.939, G: 100 - 116.779, R: 200 - 123.68
    assert!((first[0] - (-53.939)).abs() < 1e-3);
    assert!((first[1] - (-16.779)).abs() < 1e-3);
    assert!((first[2] - 76.32).abs() < 1e-3);
    assert_eq!(frame.as_nhwc().len(), 12);
  }

  #[test]
  fn uaed_frame_is_planar_and_unit_scaled() {
    let mut image = RgbImage::from_pixel(2, 1, Rgb([0, 0, 0]));
    image.put_pixel(1, 0, Rgb([255, 51, 0]));
    let frame = NchwTensorFrame::<2, 1>::unit_scaled(&image);
    assert_eq!(frame.as_nchw(), &[0.0, 1.0, 0.0, 0.2, 0.0, 0.0]);
  }

  #[test]
  fn into_tensor_keeps_layout_and_shape() {
    let image = RgbImage::from_pixel(3, 2, Rgb([1, 2, 3]));
    let tensor = NhwcTensorFrame::<3, 2>::bgr_mean_subtracted(&image, [0.0; 3]).into_tensor();
    assert_eq!(tensor.shape, vec![1, 2, 3, 3]);
    assert_eq!(tensor.layout, TensorLayout::Nhwc);
    assert_eq!(tensor.dims().unwrap(), (3, 2, 3));
    // 第 0 通道为 B
    assert_eq!(tensor.channel(0).unwrap().as_slice(), &[3.0; 6]);
    assert_eq!(tensor.channel(2).unwrap().as_slice(), &[1.0; 6]);
  }

  #[test]
  fn scale_ratio_maps_back_to_original() {
    assert_eq!(scale_ratio((640, 480), (320, 320)), (2.0, 1.5));
  }
}
