// 该文件是 Zhaozi （找字） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::model::Detection;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("未知的重叠度量: {0}")]
pub struct UnknownMetric(pub String);

/// 两个框之间的重叠度量
///
/// 坐标均视为闭区间像素，宽度为 `end - start + 1`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapMetric {
  /// 交集 / 并集
  Iou,
  /// 交集 / 候选框（得分较低的一方）面积
  #[default]
  CandidateArea,
}

impl FromStr for OverlapMetric {
  type Err = UnknownMetric;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "iou" => Ok(OverlapMetric::Iou),
      "candidate" | "candidate-area" => Ok(OverlapMetric::CandidateArea),
      other => Err(UnknownMetric(other.to_string())),
    }
  }
}

fn area(d: &Detection) -> f32 {
  let (w, h) = (d.width() + 1, d.height() + 1);
  if w <= 0 || h <= 0 { 0.0 } else { w as f32 * h as f32 }
}

/// 闭区间 [start, end] 的重叠长度
fn overlap_len(a_start: i32, a_end: i32, b_start: i32, b_end: i32) -> i64 {
  (a_end.min(b_end) as i64 - a_start.max(b_start) as i64 + 1).max(0)
}

fn intersection(a: &Detection, b: &Detection) -> f32 {
  let w = overlap_len(a.start_x, a.end_x, b.start_x, b.end_x);
  let h = overlap_len(a.start_y, a.end_y, b.start_y, b.end_y);
  w as f32 * h as f32
}

impl OverlapMetric {
  /// `kept` 已保留，`candidate` 待判定；面积非正的框与任何框重叠度为 0
  pub fn overlap(self, kept: &Detection, candidate: &Detection) -> f32 {
    let (area_kept, area_candidate) = (area(kept), area(candidate));
    if area_kept == 0.0 || area_candidate == 0.0 {
      return 0.0;
    }

    let inter = intersection(kept, candidate);
    match self {
      OverlapMetric::Iou => {
        let union = area_kept + area_candidate - inter;
        if union > 0.0 { inter / union } else { 0.0 }
      }
      OverlapMetric::CandidateArea => inter / area_candidate,
    }
  }
}

/// 贪心非极大值抑制
///
/// 按得分降序（稳定排序，同分保留先出现者）依次考察，
/// 与任一已保留框的重叠度大于 `threshold` 的候选被丢弃。
/// 返回结果按得分降序排列。
pub fn non_max_suppression(
  mut detections: Vec<Detection>,
  threshold: f32,
  metric: OverlapMetric,
) -> Vec<Detection> {
  let candidates = detections.len();
  detections.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<Detection> = Vec::with_capacity(candidates);
  for candidate in detections {
    if kept
      .iter()
      .all(|k| metric.overlap(k, &candidate) <= threshold)
    {
      kept.push(candidate);
    }
  }

  debug!("NMS: {} 个候选框保留 {} 个", candidates, kept.len());
  kept
}

#[cfg(test)]
mod tests {
  use super::*;

  fn det(start_x: i32, start_y: i32, end_x: i32, end_y: i32, score: f32) -> Detection {
    Detection {
      start_x,
      start_y,
      end_x,
      end_y,
      score,
    }
  }

  fn sorted(mut items: Vec<Detection>) -> Vec<Detection> {
    items.sort_by(|a, b| {
      (a.start_x, a.start_y, a.end_x, a.end_y)
        .cmp(&(b.start_x, b.start_y, b.end_x, b.end_y))
        .then(a.score.total_cmp(&b.score))
    });
    items
  }

  #[test]
  fn empty_input_is_empty_output() {
    assert!(non_max_suppression(Vec::new(), 0.3, OverlapMetric::default()).is_empty());
  }

  #[test]
  fn overlapping_group_keeps_highest_score() {
    let boxes = vec![
      det(0, 0, 10, 10, 0.6),
      det(1, 1, 10, 10, 0.9),
      det(0, 0, 9, 9, 0.7),
    ];
    for metric in [OverlapMetric::Iou, OverlapMetric::CandidateArea] {
      let kept = non_max_suppression(boxes.clone(), 0.3, metric);
      assert_eq!(kept, vec![det(1, 1, 10, 10, 0.9)]);
    }
  }

  #[test]
  fn threshold_one_never_suppresses() {
    let boxes = vec![
      det(0, 0, 10, 10, 0.6),
      det(0, 0, 10, 10, 0.9),
      det(2, 2, 8, 8, 0.7),
      det(40, 40, 50, 50, 0.5),
    ];
    for metric in [OverlapMetric::Iou, OverlapMetric::CandidateArea] {
      let kept = non_max_suppression(boxes.clone(), 1.0, metric);
      assert_eq!(sorted(kept), sorted(boxes.clone()));
    }
  }

  #[test]
  fn threshold_zero_keeps_one_per_cluster() {
    let a = det(0, 0, 10, 10, 0.9);
    let b = det(2, 2, 12, 12, 0.8);
    let c = det(50, 50, 60, 60, 0.7);
    let d = det(52, 52, 62, 62, 0.95);
    let kept = non_max_suppression(vec![a, b, c, d], 0.0, OverlapMetric::Iou);
    assert_eq!(kept, vec![d, a]);
  }

  #[test]
  fn never_increases_count() {
    let boxes: Vec<_> = (0..20)
      .map(|i| det(i * 3, 0, i * 3 + 10, 10, i as f32 / 20.0))
      .collect();
    for threshold in [0.0, 0.1, 0.5, 0.9, 1.0] {
      let kept = non_max_suppression(boxes.clone(), threshold, OverlapMetric::CandidateArea);
      assert!(kept.len() <= boxes.len());
      assert!(!kept.is_empty());
    }
  }

  #[test]
  fn ties_keep_the_first_box() {
    let first = det(0, 0, 10, 10, 0.9);
    let second = det(1, 0, 11, 10, 0.9);
    let kept = non_max_suppression(vec![first, second], 0.3, OverlapMetric::Iou);
    assert_eq!(kept, vec![first]);
  }

  #[test]
  fn metrics_differ_on_contained_boxes() {
    let outer = det(0, 0, 9, 9, 0.9);
    let inner = det(0, 0, 4, 4, 0.8);
    let iou = OverlapMetric::Iou.overlap(&outer, &inner);
    let ratio = OverlapMetric::CandidateArea.overlap(&outer, &inner);
    assert!((iou - 0.25).abs() < 1e-6);
    assert!((ratio - 1.0).abs() < 1e-6);

    let kept = non_max_suppression(vec![outer, inner], 0.5, OverlapMetric::Iou);
    assert_eq!(kept.len(), 2);
    let kept = non_max_suppression(vec![outer, inner], 0.5, OverlapMetric::CandidateArea);
    assert_eq!(kept, vec![outer]);
  }

  #[test]
  fn saturated_coordinates_do_not_overflow() {
    let wide = det(i32::MIN, 0, i32::MAX, 10, 0.9);
    let left = det(i32::MIN, 0, 5, 10, 0.8);
    for metric in [OverlapMetric::Iou, OverlapMetric::CandidateArea] {
      assert!(metric.overlap(&wide, &left) > 0.3);
      let kept = non_max_suppression(vec![left, wide], 0.3, metric);
      assert_eq!(kept, vec![wide]);
    }
  }

  #[test]
  fn degenerate_boxes_pass_through() {
    let normal = det(0, 0, 10, 10, 0.5);
    let inverted = det(5, 5, 0, 0, 0.9);
    assert_eq!(OverlapMetric::Iou.overlap(&inverted, &normal), 0.0);
    let kept = non_max_suppression(vec![normal, inverted], 0.0, OverlapMetric::CandidateArea);
    assert_eq!(kept, vec![inverted, normal]);
  }

  #[test]
  fn metric_parses_from_str() {
    assert_eq!("IoU".parse::<OverlapMetric>(), Ok(OverlapMetric::Iou));
    assert_eq!(
      "candidate".parse::<OverlapMetric>(),
      Ok(OverlapMetric::CandidateArea)
    );
    assert!("dice".parse::<OverlapMetric>().is_err());
  }
}
