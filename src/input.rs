// 该文件是 Zhaozi （找字） 项目的一部分。
// src/input.rs - 推理输出张量输入
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

use image::RgbImage;
use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme, tensor::TensorBundle};

/// 一帧推理结果：运行时输出的张量，以及可选的原始图像
#[derive(Debug, Clone)]
pub struct Frame {
  pub index: usize,
  pub name: String,
  pub image: Option<RgbImage>,
  pub tensors: TensorBundle,
}

impl Frame {
  pub fn from_tensors(index: usize, name: impl Into<String>, tensors: TensorBundle) -> Self {
    Self {
      index,
      name: name.into(),
      image: None,
      tensors,
    }
  }

  pub fn with_image(mut self, image: RgbImage) -> Self {
    self.image = Some(image);
    self
  }

  /// 原图尺寸，没有原图时使用 `fallback`
  pub fn canvas_size(&self, fallback: (u32, u32)) -> (u32, u32) {
    self
      .image
      .as_ref()
      .map(|image| image.dimensions())
      .unwrap_or(fallback)
  }
}

mod tensor_file;
pub use self::tensor_file::{TensorFileInput, TensorFileInputError, load_frame};

mod tensor_folder;
pub use self::tensor_folder::{TensorFolderInput, TensorFolderInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("张量文件输入错误: {0}")]
  TensorFileInputError(#[from] TensorFileInputError),
  #[error("张量目录输入错误: {0}")]
  TensorFolderInputError(#[from] TensorFolderInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  TensorFile(TensorFileInput),
  TensorFolder(TensorFolderInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      TensorFileInput::SCHEME => Ok(InputWrapper::TensorFile(TensorFileInput::from_url(url)?)),
      TensorFolderInput::SCHEME => Ok(InputWrapper::TensorFolder(TensorFolderInput::from_url(
        url,
      )?)),
      _ => Err(InputError::SchemeMismatch),
    }
  }
}

impl InputWrapper {
  /// 是否为连续多帧输入
  pub fn is_stream(&self) -> bool {
    matches!(self, InputWrapper::TensorFolder(_))
  }
}

impl Iterator for InputWrapper {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::TensorFile(input) => input.next(),
      InputWrapper::TensorFolder(input) => input.next(),
    }
  }
}
