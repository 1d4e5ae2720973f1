//! 任务生命周期事件
//!
//! 事件名称（[`JobEvent::name`]）是对外兼容的接口，不要随意修改。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::sync::broadcast;

use crate::error::AppError;
use crate::models::{CaptureResult, Dimensions, JobReport};

/// 默认广播通道容量
const DEFAULT_CAPACITY: usize = 1024;

/// 任务事件
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// 任务开始渲染
    RenderStart { job_id: String, resources: usize },
    /// 开始创建窗口
    WindowOpenStart,
    /// 窗口创建完成
    WindowOpenEnd { window_id: String, dimensions: Dimensions },
    /// 窗口尺寸发生变化
    WindowResize { dimensions: Dimensions },
    /// 开始加载资源
    LoadStart { index: usize, url: String },
    /// 资源加载完成
    LoadEnd { index: usize, url: String },
    /// 资源加载失败（不中止任务）
    LoadFailed { index: usize, url: String, error: AppError },
    /// 开始等待页面事件
    EventWaitStart { event_name: String },
    /// 收到匹配的页面事件
    EventWaitEnd { event_name: String, detail: JsonValue },
    /// 等待页面事件超时，继续捕获
    EventWaitTimeout { event_name: String },
    /// 开始调用就绪观察者
    ObserverStart { detail: JsonValue },
    /// 就绪观察者完成
    ObserverEnd,
    /// 就绪观察者超时，继续捕获
    ObserverTimeout { timeout: Duration },
    /// 开始捕获
    CaptureStart { index: usize },
    /// 捕获结束（文件模式带 `file`，内存模式带 `data`）
    CaptureEnd {
        index: usize,
        file: Option<PathBuf>,
        data: Option<Arc<[u8]>>,
        error: Option<AppError>,
    },
    /// 单个资源导出完成
    ExportComplete { result: CaptureResult },
    /// 所有资源处理完毕
    JobComplete { report: JobReport },
    /// 清理器强制回收了窗口
    WindowTermination { window_id: String, lifespan: Duration },
}

impl JobEvent {
    /// 事件名称
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::RenderStart { .. } => "job.render.start",
            JobEvent::WindowOpenStart => "window.open.start",
            JobEvent::WindowOpenEnd { .. } => "window.open.end",
            JobEvent::WindowResize { .. } => "window.resize",
            JobEvent::LoadStart { .. } => "window.load.start",
            JobEvent::LoadEnd { .. } => "window.load.end",
            JobEvent::LoadFailed { .. } => "window.load.failed",
            JobEvent::EventWaitStart { .. } => "window.event.wait.start",
            JobEvent::EventWaitEnd { .. } => "window.event.wait.end",
            JobEvent::EventWaitTimeout { .. } => "window.event.wait.timeout",
            JobEvent::ObserverStart { .. } => "window.observer.start",
            JobEvent::ObserverEnd => "window.observer.end",
            JobEvent::ObserverTimeout { .. } => "window.observer.timeout",
            JobEvent::CaptureStart { .. } => "window.capture.start",
            JobEvent::CaptureEnd { .. } => "window.capture.end",
            JobEvent::ExportComplete { .. } => "export-complete",
            JobEvent::JobComplete { .. } => "job-complete",
            JobEvent::WindowTermination { .. } => "window.termination",
        }
    }
}

/// 基于广播通道的事件发射器
///
/// `emit` 从不等待；处理过慢的订阅者会收到 `Lagged` 而不是阻塞任务。
pub struct EventEmitter {
    tx: broadcast::Sender<JobEvent>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 发送事件，返回收到事件的订阅者数量
    pub fn emit(&self, event: JobEvent) -> usize {
        tracing::trace!("emit {}", event.name());
        self.tx.send(event).unwrap_or(0)
    }

    /// 订阅此后发出的所有事件
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_with_no_subscribers() {
        let emitter = EventEmitter::new();
        assert_eq!(emitter.emit(JobEvent::WindowOpenStart), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();

        emitter.emit(JobEvent::WindowOpenStart);
        emitter.emit(JobEvent::EventWaitTimeout {
            event_name: "ready".into(),
        });

        assert_eq!(rx.recv().await.unwrap().name(), "window.open.start");
        assert_eq!(rx.recv().await.unwrap().name(), "window.event.wait.timeout");
    }

    #[tokio::test]
    async fn slow_receiver_is_lagged() {
        let emitter = EventEmitter::with_capacity(2);
        let mut rx = emitter.subscribe();

        for _ in 0..3 {
            emitter.emit(JobEvent::ObserverEnd);
        }

        assert!(rx.recv().await.is_err());
    }
}
