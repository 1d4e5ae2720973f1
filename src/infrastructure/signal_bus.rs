//! 跨进程就绪信号通道
//!
//! 页面内注入的脚本在 DOM 事件触发时发出信号，引擎适配器把它转发到这里。
//! 订阅按 (事件名, 任务 ID) 过滤，所以并发任务即使使用同一个默认事件名也互不干扰。

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 256;

/// 页面中用于发送信号的绑定函数名
pub const SIGNAL_BINDING: &str = "__htmlExportSignal";

/// 一次就绪信号
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadySignal {
    pub event_name: String,
    pub job_id: String,
    #[serde(default)]
    pub detail: JsonValue,
}

impl ReadySignal {
    pub fn new(event_name: impl Into<String>, job_id: impl Into<String>, detail: JsonValue) -> Self {
        Self {
            event_name: event_name.into(),
            job_id: job_id.into(),
            detail,
        }
    }

    /// 解析页面通过绑定函数发送的 JSON 载荷
    pub fn from_payload(payload: &str) -> Option<Self> {
        serde_json::from_str(payload).ok()
    }
}

/// 信号总线（进程内，可克隆）
#[derive(Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<ReadySignal>,
}

impl SignalBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self { tx }
    }

    /// 发布信号，返回收到信号的订阅数量
    pub fn publish(&self, signal: ReadySignal) -> usize {
        debug!(
            "收到页面信号 '{}' (任务 {})",
            signal.event_name, signal.job_id
        );
        self.tx.send(signal).unwrap_or(0)
    }

    /// 订阅指定任务的指定事件；丢弃返回值即取消订阅
    pub fn subscribe(&self, event_name: impl Into<String>, job_id: impl Into<String>) -> SignalSubscription {
        SignalSubscription {
            rx: self.tx.subscribe(),
            event_name: event_name.into(),
            job_id: job_id.into(),
        }
    }

    /// 当前活跃订阅数量
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

/// 单个任务的信号订阅
pub struct SignalSubscription {
    rx: broadcast::Receiver<ReadySignal>,
    event_name: String,
    job_id: String,
}

impl SignalSubscription {
    /// 等待下一个匹配的信号；总线关闭时返回 `None`
    pub async fn recv(&mut self) -> Option<ReadySignal> {
        loop {
            match self.rx.recv().await {
                Ok(signal) if signal.event_name == self.event_name && signal.job_id == self.job_id => {
                    return Some(signal);
                }
                Ok(signal) => {
                    debug!(
                        "忽略不属于任务 {} 的信号 '{}' (来自任务 {})",
                        self.job_id, signal.event_name, signal.job_id
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("信号订阅落后，跳过 {} 条信号", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
