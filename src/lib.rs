// 该文件是 Zhaozi （找字） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod frame;
pub mod grid;
pub mod input;
pub mod model;
pub mod output;
pub mod task;
pub mod tensor;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// URL 路径按百分号编码解码后的文件路径
pub(crate) fn url_path(url: &url::Url) -> std::path::PathBuf {
  match urlencoding::decode(url.path()) {
    Ok(path) => std::path::PathBuf::from(path.into_owned()),
    Err(_) => std::path::PathBuf::from(url.path()),
  }
}

/// 从 URL 查询参数中读取并解析一个值，参数不存在时返回 `None`
pub(crate) fn query_value<T: std::str::FromStr>(
  url: &url::Url,
  key: &str,
) -> Option<Result<T, T::Err>> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .map(|(_, v)| v.parse::<T>())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_path_is_percent_decoded() {
    let url = url::Url::parse("tensor:///tmp/my dump/帧 01.json?image=/a.png").unwrap();
    assert_eq!(url.path(), "/tmp/my%20dump/%E5%B8%A7%2001.json");
    assert_eq!(
      url_path(&url),
      std::path::PathBuf::from("/tmp/my dump/帧 01.json")
    );
  }

  #[test]
  fn query_value_parses_and_reports_missing() {
    let url = url::Url::parse("east:?nms=0.4&width=abc").unwrap();
    assert_eq!(query_value::<f32>(&url, "nms"), Some(Ok(0.4)));
    assert!(matches!(query_value::<u32>(&url, "width"), Some(Err(_))));
    assert!(query_value::<f32>(&url, "confidence").is_none());
  }
}
