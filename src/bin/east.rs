// 该文件是 Zhaozi （找字） 项目的一部分。
// src/bin/east.rs - EAST 文本检测后处理
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use zhaozi::{
  FromUrl,
  input::InputWrapper,
  model::{EastBuilder, nms::OverlapMetric},
  output::OutputWrapper,
  task::{ContinuousTask, OneShotTask, Task},
};

/// Zhaozi EAST 文本检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 后处理参数，如 east:?confidence=0.5&nms=0.3
  #[arg(long, value_name = "MODEL", default_value = "east:")]
  pub model: Url,
  /// 输入来源：tensor:///dump.json?image=/a.png 或 folder:///dumps
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径：image:///out.png、folder:///records 或 json:///out.jsonl
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 置信度阈值 (0.0 - 1.0)，覆盖模型参数
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,
  /// NMS 重叠阈值 (0.0 - 1.0)，覆盖模型参数
  #[arg(long, value_name = "THRESHOLD")]
  pub nms_threshold: Option<f32>,
  /// 重叠度量：candidate 或 iou
  #[arg(long, value_name = "METRIC")]
  pub metric: Option<OverlapMetric>,

  /// 最大处理帧数（仅对目录输入有效）
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型参数: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let mut builder = EastBuilder::from_url(&args.model)?;
  if let Some(confidence) = args.confidence {
    builder = builder.confidence(confidence);
  }
  if let Some(nms_threshold) = args.nms_threshold {
    builder = builder.nms_threshold(nms_threshold);
  }
  if let Some(metric) = args.metric {
    builder = builder.metric(metric);
  }
  let model = builder.build()?;

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  if input.is_stream() {
    ContinuousTask::default()
      .with_frame_number(args.frame_number)
      .run_task(input, model, output)
  } else {
    OneShotTask.run_task(input, model, output)
  }
}
