// 该文件是 Zhaozi （找字） 项目的一部分。
// src/output/json_record.rs - JSON 行记录输出
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

use std::{
  fs::File,
  io::{BufWriter, Write},
  sync::{Mutex, PoisonError},
};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::Frame,
  output::{Render, draw::Visualize},
  url_path,
};

#[derive(Error, Debug)]
pub enum JsonRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
}

/// 每帧写出一行 JSON 摘要
pub struct JsonRecordOutput {
  writer: Mutex<BufWriter<File>>,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonRecordOutputError::SchemeMismatch);
    }

    let path = url_path(uri);
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let file = File::create(&path)?;
    info!("JSON 记录写入: {}", path.display());

    Ok(JsonRecordOutput {
      writer: Mutex::new(BufWriter::new(file)),
    })
  }
}

impl<D: Visualize> Render<Frame, D> for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &D) -> Result<(), Self::Error> {
    let summary = result.summary(frame);
    let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
    serde_json::to_writer(&mut *writer, &summary)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    debug!("第 {} 帧已写入 JSON 记录", frame.index);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::Value;

  use super::*;
  use crate::{
    model::{DetectResult, Detection},
    tensor::TensorBundle,
  };

  #[test]
  fn writes_one_line_per_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.jsonl");
    let url = Url::parse(&format!("json://{}", path.display())).unwrap();
    let output = JsonRecordOutput::from_url(&url).unwrap();

    let result = DetectResult {
      items: Box::new([Detection {
        start_x: 0,
        start_y: 0,
        end_x: 3,
        end_y: 3,
        score: 0.5,
      }]),
      input_size: (4, 4),
    };
    for index in 0..2 {
      let frame = Frame::from_tensors(index, format!("f{index}"), TensorBundle::new());
      output.render_result(&frame, &result).unwrap();
    }

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<Value> = content
      .lines()
      .map(|line| serde_json::from_str(line).unwrap())
      .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1]["name"], "f1");
    assert_eq!(lines[0]["detections"][0]["end_x"], 3);
  }
}
