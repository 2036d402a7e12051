// 该文件是 Zhaozi （找字） 项目的一部分。
// src/task.rs - 任务调度
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
  fmt,
  sync::atomic::{AtomicBool, Ordering},
  thread,
  time::{Duration, Instant},
};

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::{model::Model, output::Render};

/// 收到中断信号后，强制退出前的等待时间
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 单帧的后处理与渲染耗时
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FrameTiming {
  pub infer: Duration,
  pub render: Duration,
}

impl FrameTiming {
  pub fn total(&self) -> Duration {
    self.infer + self.render
  }
}

/// 对一帧做后处理并交给输出
fn process<M, O>(model: &M, output: &O, frame: &M::Input) -> anyhow::Result<FrameTiming>
where
  M: Model,
  M::Error: std::error::Error + Send + Sync + 'static,
  O: Render<M::Input, M::Output>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  let start = Instant::now();
  let result = model.infer(frame).context("后处理失败")?;
  let infer = start.elapsed();
  output.render_result(frame, &result).context("渲染失败")?;

  Ok(FrameTiming {
    infer,
    render: start.elapsed() - infer,
  })
}

/// 只处理第一帧
pub struct OneShotTask;

impl<I, M, O> Task<I, M, O> for OneShotTask
where
  I: Iterator<Item = M::Input>,
  M: Model,
  M::Error: std::error::Error + Send + Sync + 'static,
  O: Render<M::Input, M::Output>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    let timing = process(&model, &output, &frame)?;
    info!(
      "单帧任务完成，后处理 {:.2?}，渲染 {:.2?}",
      timing.infer, timing.render
    );
    Ok(())
  }
}

/// 连续任务的结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
  Exhausted,
  FrameLimit,
  Interrupted,
}

impl fmt::Display for StopReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      StopReason::Exhausted => "输入结束",
      StopReason::FrameLimit => "达到指定帧数",
      StopReason::Interrupted => "收到中断信号",
    })
  }
}

/// 连续任务的统计
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
  pub frames: usize,
  pub busy: Duration,
  pub reason: StopReason,
}

impl RunSummary {
  pub fn average(&self) -> Option<Duration> {
    u32::try_from(self.frames)
      .ok()
      .filter(|n| *n > 0)
      .map(|n| self.busy / n)
  }
}

/// 安装一次 Ctrl-C 处理器；之后的调用只清除中断标记
fn install_interrupt() -> anyhow::Result<&'static AtomicBool> {
  INTERRUPTED.store(false, Ordering::SeqCst);
  if !HANDLER_INSTALLED.swap(true, Ordering::SeqCst) {
    let installed = ctrlc::set_handler(|| {
      if INTERRUPTED.swap(true, Ordering::SeqCst) {
        return;
      }
      info!("收到中断信号，准备退出...");
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_AFTER);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    });
    if let Err(e) = installed {
      HANDLER_INSTALLED.store(false, Ordering::SeqCst);
      return Err(e).context("无法安装 Ctrl-C 处理器");
    }
  }
  Ok(&INTERRUPTED)
}

/// 逐帧处理直到输入结束、达到帧数或收到中断信号
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  /// `None` 或 0 表示不限帧数
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number.filter(|n| *n > 0);
    self
  }

  /// 每帧处理后检查 `stop`，返回时给出统计
  pub fn drive<I, M, O>(
    &self,
    input: I,
    model: &M,
    output: &O,
    stop: impl Fn() -> bool,
  ) -> anyhow::Result<RunSummary>
  where
    I: Iterator<Item = M::Input>,
    M: Model,
    M::Error: std::error::Error + Send + Sync + 'static,
    O: Render<M::Input, M::Output>,
    O::Error: std::error::Error + Send + Sync + 'static,
  {
    let mut summary = RunSummary {
      frames: 0,
      busy: Duration::ZERO,
      reason: StopReason::Exhausted,
    };

    for frame in input {
      summary.frames += 1;
      let timing = process(model, output, &frame)
        .with_context(|| format!("第 {} 帧处理失败", summary.frames))?;
      summary.busy += timing.total();
      debug!(
        "第 {} 帧：后处理 {:.2?}，渲染 {:.2?}",
        summary.frames, timing.infer, timing.render
      );

      if self.frame_number.is_some_and(|n| summary.frames >= n) {
        summary.reason = StopReason::FrameLimit;
        break;
      }
      if stop() {
        summary.reason = StopReason::Interrupted;
        break;
      }
    }

    Ok(summary)
  }
}

impl<I, M, O> Task<I, M, O> for ContinuousTask
where
  I: Iterator<Item = M::Input>,
  M: Model,
  M::Error: std::error::Error + Send + Sync + 'static,
  O: Render<M::Input, M::Output>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    let interrupted = install_interrupt()?;
    info!("连续任务开始，帧数上限: {:?}", self.frame_number);

    let summary = self.drive(input, &model, &output, || {
      interrupted.load(Ordering::SeqCst)
    })?;
    match summary.average() {
      Some(average) => info!(
        "任务结束（{}），共 {} 帧，平均每帧 {:.2?}",
        summary.reason, summary.frames, average
      ),
      None => warn!("任务结束（{}），没有处理任何帧", summary.reason),
    }
    Ok(())
  }
}
