// 该文件是 Zhaozi （找字） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use serde_json::{Value, json};

use crate::{
  input::Frame,
  model::{DetectResult, Detection, EdgeMap},
};

const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const BOX_THICKNESS: i32 = 2;

pub struct Draw {
  box_color: [u8; 3],
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      box_color: BOX_COLOR,
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  /// 绘制检测框，坐标为闭区间像素；宽高非正的框不绘制
  ///
  /// 框线向内加粗。超出图像的部分先裁剪到图像外一圈，线宽以内的边仍落在图像外。
  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[Detection]) {
    let thickness = self.thickness as i64;
    let (max_x, max_y) = (image.width() as i64, image.height() as i64);
    let clip = |v: i32, max: i64| (v as i64).clamp(-thickness, max + thickness);

    for detection in detections {
      if detection.width() < 0 || detection.height() < 0 {
        continue;
      }
      let (x0, x1) = (clip(detection.start_x, max_x), clip(detection.end_x, max_x));
      let (y0, y1) = (clip(detection.start_y, max_y), clip(detection.end_y, max_y));

      for t in 0..thickness {
        let (w, h) = (x1 - x0 + 1 - 2 * t, y1 - y0 + 1 - 2 * t);
        if w <= 0 || h <= 0 {
          break;
        }
        let rect = Rect::at((x0 + t) as i32, (y0 + t) as i32).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(image, rect, Rgb(self.box_color));
      }
    }
  }
}

/// 可渲染、可记录的后处理结果
pub trait Visualize {
  /// 将结果绘制到帧上，返回新图像
  fn render(&self, frame: &Frame, draw: &Draw) -> RgbImage;
  /// 文本记录，每行一条
  fn record_lines(&self, frame: &Frame) -> Vec<String>;
  fn summary(&self, frame: &Frame) -> Value;
  fn is_empty(&self) -> bool;
}

impl Visualize for DetectResult {
  fn render(&self, frame: &Frame, draw: &Draw) -> RgbImage {
    let mut canvas = frame
      .image
      .clone()
      .unwrap_or_else(|| RgbImage::new(self.input_size.0, self.input_size.1));
    let (width, height) = canvas.dimensions();
    draw.draw_detections(&mut canvas, &self.scale_to(width, height));
    canvas
  }

  fn record_lines(&self, frame: &Frame) -> Vec<String> {
    let (width, height) = frame.canvas_size(self.input_size);
    self
      .scale_to(width, height)
      .iter()
      .map(|d| {
        format!(
          "{:.4}, {}, {}, {}, {}",
          d.score, d.start_x, d.start_y, d.end_x, d.end_y
        )
      })
      .collect()
  }

  fn summary(&self, frame: &Frame) -> Value {
    let (width, height) = frame.canvas_size(self.input_size);
    json!({
      "frame": frame.index,
      "name": frame.name,
      "width": width,
      "height": height,
      "detections": self.scale_to(width, height),
    })
  }

  fn is_empty(&self) -> bool {
    DetectResult::is_empty(self)
  }
}

impl Visualize for EdgeMap {
  /// 二值化的边缘图替换原图
  fn render(&self, frame: &Frame, _draw: &Draw) -> RgbImage {
    let (rows, cols) = self.grid().shape();
    let (width, height) = frame.canvas_size((cols as u32, rows as u32));
    DynamicImage::ImageLuma8(self.mask(width, height)).to_rgb8()
  }

  fn record_lines(&self, _frame: &Frame) -> Vec<String> {
    vec![format!("edge_ratio, {:.4}", self.edge_ratio())]
  }

  fn summary(&self, frame: &Frame) -> Value {
    let (rows, cols) = self.grid().shape();
    json!({
      "frame": frame.index,
      "name": frame.name,
      "rows": rows,
      "cols": cols,
      "threshold": self.threshold(),
      "edge_ratio": self.edge_ratio(),
    })
  }

  fn is_empty(&self) -> bool {
    self.edge_ratio() == 0.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{grid::Grid, tensor::TensorBundle};

  fn result(items: Vec<Detection>) -> DetectResult {
    DetectResult {
      items: items.into_boxed_slice(),
      input_size: (20, 20),
    }
  }

  fn det(start_x: i32, start_y: i32, end_x: i32, end_y: i32) -> Detection {
    Detection {
      start_x,
      start_y,
      end_x,
      end_y,
      score: 0.9,
    }
  }

  #[test]
  fn detections_are_drawn_scaled_to_the_image() {
    let frame = Frame::from_tensors(0, "f", TensorBundle::new())
      .with_image(RgbImage::new(40, 40));
    let image = result(vec![det(2, 2, 10, 10)]).render(&frame, &Draw::default());
    assert_eq!(image.dimensions(), (40, 40));
    // 缩放 2 倍后左上角位于 (4, 4)
    assert_eq!(image.get_pixel(4, 4), &Rgb(BOX_COLOR));
    assert_eq!(image.get_pixel(5, 5), &Rgb(BOX_COLOR));
    assert_eq!(image.get_pixel(12, 12), &Rgb([0, 0, 0]));
  }

  #[test]
  fn degenerate_detections_are_skipped() {
    let mut image = RgbImage::new(10, 10);
    Draw::default().draw_detections(&mut image, &[det(6, 6, 2, 2)]);
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }

  #[test]
  fn thickness_and_color_are_configurable() {
    let mut image = RgbImage::new(10, 10);
    let draw = Draw {
      box_color: [255, 0, 0],
      thickness: 1,
    };
    draw.draw_detections(&mut image, &[det(2, 2, 7, 7)]);
    assert_eq!(image.get_pixel(2, 2), &Rgb([255, 0, 0]));
    assert_eq!(image.get_pixel(7, 7), &Rgb([255, 0, 0]));
    assert_eq!(image.get_pixel(3, 3), &Rgb([0, 0, 0]));
  }

  #[test]
  fn saturated_boxes_are_clipped_to_the_image() {
    let mut image = RgbImage::new(10, 10);
    let boxes = [det(i32::MIN, 2, 5, 7), det(3, 3, i32::MAX, i32::MAX)];
    Draw::default().draw_detections(&mut image, &boxes);
    // 第一个框只有右边可见，第二个框只有左上两条边可见
    assert_eq!(image.get_pixel(5, 4), &Rgb(BOX_COLOR));
    assert_eq!(image.get_pixel(0, 4), &Rgb([0, 0, 0]));
    assert_eq!(image.get_pixel(3, 8), &Rgb(BOX_COLOR));
    assert_eq!(image.get_pixel(9, 9), &Rgb([0, 0, 0]));
  }

  #[test]
  fn blank_canvas_uses_input_size() {
    let frame = Frame::from_tensors(0, "f", TensorBundle::new());
    let image = result(Vec::new()).render(&frame, &Draw::default());
    assert_eq!(image.dimensions(), (20, 20));
  }

  #[test]
  fn record_lines_list_scaled_boxes() {
    let frame = Frame::from_tensors(0, "f", TensorBundle::new())
      .with_image(RgbImage::new(40, 20));
    let lines = result(vec![det(2, 2, 10, 10)]).record_lines(&frame);
    assert_eq!(lines, vec!["0.9000, 4, 2, 20, 10".to_string()]);
  }

  #[test]
  fn edge_map_summary_reports_ratio() {
    let frame = Frame::from_tensors(3, "edges", TensorBundle::new());
    let edges = EdgeMap::new(Grid::new(1, 2, vec![0.0, 200.0]).unwrap(), 125.0);
    let summary = edges.summary(&frame);
    assert_eq!(summary["frame"], 3);
    assert_eq!(summary["edge_ratio"], 0.5);
    assert!(!Visualize::is_empty(&edges));

    let image = edges.render(&frame, &Draw::default());
    assert_eq!(image.dimensions(), (2, 1));
    assert_eq!(image.get_pixel(0, 0), &Rgb([255, 255, 255]));
    assert_eq!(image.get_pixel(1, 0), &Rgb([0, 0, 0]));
  }
}
