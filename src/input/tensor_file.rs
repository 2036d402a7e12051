// 该文件是 Zhaozi （找字） 项目的一部分。
// src/input/tensor_file.rs - 张量文件输入
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

use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, input::Frame, tensor::TensorBundle, url_path};

#[derive(Error, Debug)]
pub enum TensorFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("张量解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 读取一个张量文件，`image` 给出时一并读取原图
pub fn load_frame(
  index: usize,
  tensor_path: &Path,
  image_path: Option<&Path>,
) -> Result<Frame, TensorFileInputError> {
  debug!("读取张量文件: {}", tensor_path.display());
  let data = std::fs::read(tensor_path)?;
  let tensors: TensorBundle = serde_json::from_slice(&data)?;
  debug!(
    "张量文件包含: {}",
    tensors.names().collect::<Vec<_>>().join(", ")
  );

  let name = tensor_path
    .file_stem()
    .map(|stem| stem.to_string_lossy().into_owned())
    .unwrap_or_default();
  let mut frame = Frame::from_tensors(index, name, tensors);

  if let Some(image_path) = image_path {
    debug!("读取原始图像: {}", image_path.display());
    let image = ImageReader::open(image_path)?.decode()?.to_rgb8();
    frame = frame.with_image(image);
  }

  Ok(frame)
}

pub struct TensorFileInput {
  frame: Option<Frame>,
}

impl FromUrlWithScheme for TensorFileInput {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorFileInput {
  type Error = TensorFileInputError;

  /// `tensor:///path/dump.json?image=/path/image.png`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(TensorFileInputError::SchemaMismatch);
    }

    let image = url
      .query_pairs()
      .find(|(k, _)| k == "image")
      .map(|(_, v)| PathBuf::from(v.as_ref()));

    let path = url_path(url);
    let frame = load_frame(0, &path, image.as_deref())?;
    info!(
      "已读取张量文件: {}{}",
      path.display(),
      if frame.image.is_some() { " (含原图)" } else { "" }
    );

    Ok(TensorFileInput { frame: Some(frame) })
  }
}

impl Iterator for TensorFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}

#[cfg(test)]
mod tests {
  use image::{Rgb, RgbImage};

  use super::*;

  const DUMP: &str = r#"{"scores": {"shape": [1, 1, 2, 1], "data": [0.2, 0.8]}}"#;

  #[test]
  fn reads_single_frame_with_image() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("frame.json");
    let image = dir.path().join("frame.png");
    std::fs::write(&dump, DUMP).unwrap();
    RgbImage::from_pixel(4, 3, Rgb([1, 2, 3]))
      .save(&image)
      .unwrap();

    let mut url = Url::parse(&format!("tensor://{}", dump.display())).unwrap();
    url
      .query_pairs_mut()
      .append_pair("image", &image.to_string_lossy());

    let mut input = TensorFileInput::from_url(&url).unwrap();
    let frame = input.next().unwrap();
    assert_eq!(frame.name, "frame");
    assert_eq!(frame.canvas_size((0, 0)), (4, 3));
    assert!(frame.tensors.get("scores").is_some());
    assert!(input.next().is_none());
  }

  #[test]
  fn paths_with_spaces_are_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("my dump.json");
    std::fs::write(&dump, DUMP).unwrap();

    let url = Url::parse(&format!("tensor://{}", dump.display())).unwrap();
    assert!(url.path().ends_with("my%20dump.json"));

    let frame = TensorFileInput::from_url(&url).unwrap().next().unwrap();
    assert_eq!(frame.name, "my dump");
  }

  #[test]
  fn malformed_json_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("bad.json");
    std::fs::write(&dump, "{not json").unwrap();
    assert!(matches!(
      load_frame(0, &dump, None),
      Err(TensorFileInputError::ParseError(_))
    ));
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("image:///tmp/a.png").unwrap();
    assert!(matches!(
      TensorFileInput::from_url(&url),
      Err(TensorFileInputError::SchemaMismatch)
    ));
  }
}
