// 该文件是 Zhaozi （找字） 项目的一部分。
// src/bin/prepare.rs - 生成模型输入张量
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

use std::{fs::File, io::BufWriter, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use image::ImageReader;
use tracing::info;

use zhaozi::{
  frame::{EAST_MEAN_RGB, EastInputFrame, UaedInputFrame},
  tensor::TensorBundle,
};

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ModelKind {
  /// 320x320 NHWC，BGR 通道减去均值
  East,
  /// 640x480 NCHW，归一化到 [0, 1]
  Uaed,
}

/// 将图像转换为推理运行时的输入张量
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像路径
  #[arg(long, value_name = "IMAGE")]
  pub image: PathBuf,
  /// 目标模型
  #[arg(long, value_enum, default_value_t = ModelKind::East)]
  pub model: ModelKind,
  /// 输出张量文件 (JSON)
  #[arg(long, value_name = "OUTPUT")]
  pub output: PathBuf,
  /// 张量名称
  #[arg(long, default_value = "input")]
  pub name: String,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let image = ImageReader::open(&args.image)
    .with_context(|| format!("无法打开图像 {}", args.image.display()))?
    .decode()?
    .to_rgb8();
  info!(
    "读取图像 {} ({}x{})",
    args.image.display(),
    image.width(),
    image.height()
  );

  let tensor = match args.model {
    ModelKind::East => EastInputFrame::bgr_mean_subtracted(&image, EAST_MEAN_RGB).into_tensor(),
    ModelKind::Uaed => UaedInputFrame::unit_scaled(&image).into_tensor(),
  };
  info!("输入张量形状: {:?}", tensor.shape);

  let bundle = TensorBundle::new().with(args.name, tensor);
  let writer = BufWriter::new(
    File::create(&args.output)
      .with_context(|| format!("无法创建 {}", args.output.display()))?,
  );
  serde_json::to_writer(writer, &bundle)?;
  info!("已写出张量文件: {}", args.output.display());

  Ok(())
}
