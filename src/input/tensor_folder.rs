// 该文件是 Zhaozi （找字） 项目的一部分。
// src/input/tensor_folder.rs - 张量目录输入
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

use std::{collections::VecDeque, path::PathBuf};

use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{Frame, load_frame},
  url_path,
};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

#[derive(Error, Debug)]
pub enum TensorFolderInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按文件名顺序逐个读取目录中的 `*.json` 张量文件
pub struct TensorFolderInput {
  pending: VecDeque<PathBuf>,
  index: usize,
}

impl FromUrlWithScheme for TensorFolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for TensorFolderInput {
  type Error = TensorFolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TensorFolderInputError::SchemeMismatch);
    }

    let directory = url_path(url);
    let mut files = std::fs::read_dir(&directory)?
      .filter_map(|entry| entry.ok().map(|entry| entry.path()))
      .filter(|path| {
        path.is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
      })
      .collect::<Vec<_>>();
    files.sort();

    info!("目录 {} 中共有 {} 个张量文件", directory.display(), files.len());
    if files.is_empty() {
      warn!("目录 {} 中没有张量文件", directory.display());
    }

    Ok(TensorFolderInput {
      pending: files.into(),
      index: 0,
    })
  }
}

/// 与张量文件同名的原图
fn sibling_image(tensor_path: &std::path::Path) -> Option<PathBuf> {
  IMAGE_EXTENSIONS
    .iter()
    .map(|ext| tensor_path.with_extension(ext))
    .find(|path| path.is_file())
}

impl Iterator for TensorFolderInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.pending.pop_front() {
      let image = sibling_image(&path);
      match load_frame(self.index, &path, image.as_deref()) {
        Ok(frame) => {
          self.index += 1;
          return Some(frame);
        }
        Err(e) => {
          error!("跳过无法读取的张量文件 {}: {}", path.display(), e);
        }
      }
    }
    None
  }
}
