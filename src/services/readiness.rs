//! 就绪等待服务 - 业务能力层
//!
//! 决定资源加载完成后何时可以捕获：
//! 1. 固定延迟（`outputWait`）
//! 2. 等待页面派发指定事件，超时后照常继续
//!
//! 超时从不中止任务，只发出通知事件。

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::events::{EventEmitter, JobEvent};
use crate::infrastructure::{RendererSession, SignalBus, SIGNAL_BINDING};
use crate::models::RenderConfig;

/// 未指定事件名时等待的默认事件
pub const DEFAULT_READY_EVENT: &str = "view-ready";

/// 等待页面事件的默认上限
pub const MAX_EVENT_WAIT: Duration = Duration::from_millis(10_000);

/// 就绪观察者的执行上限
pub const MAX_OBSERVER_WAIT: Duration = Duration::from_millis(10_000);

/// 就绪观察者：收到页面事件后、捕获之前调用，参数为事件的 detail
pub type ReadyObserver = Arc<dyn Fn(JsonValue) -> BoxFuture<'static, ()> + Send + Sync>;

/// 等待结果
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    /// 固定延迟已结束
    Delayed(Duration),
    /// 收到了匹配的页面事件
    Signalled { detail: JsonValue },
    /// 等待超时
    TimedOut,
}

/// 就绪协调器
///
/// 每个任务一个，信号订阅以任务 ID 为范围，其他任务的同名事件不会误触发。
pub struct ReadinessCoordinator {
    bus: SignalBus,
    events: Arc<EventEmitter>,
    job_id: String,
}

impl ReadinessCoordinator {
    pub fn new(bus: SignalBus, events: Arc<EventEmitter>, job_id: impl Into<String>) -> Self {
        Self {
            bus,
            events,
            job_id: job_id.into(),
        }
    }

    /// 等待页面就绪
    pub async fn wait(
        &self,
        session: &RendererSession,
        config: &RenderConfig,
        observer: Option<&ReadyObserver>,
    ) -> Readiness {
        match config.wait_for_js_event.as_deref() {
            Some(event_name) => {
                let event_name = if event_name.is_empty() {
                    DEFAULT_READY_EVENT
                } else {
                    event_name
                };
                let timeout = if config.output_wait > 0 {
                    Duration::from_millis(config.output_wait)
                } else {
                    MAX_EVENT_WAIT
                };
                self.wait_for_signal(session, event_name, timeout, observer).await
            }
            None => {
                let delay = Duration::from_millis(config.output_wait);
                if !delay.is_zero() {
                    debug!("[任务 {}] 固定等待 {:?}", self.job_id, delay);
                    tokio::time::sleep(delay).await;
                }
                Readiness::Delayed(delay)
            }
        }
    }

    async fn wait_for_signal(
        &self,
        session: &RendererSession,
        event_name: &str,
        timeout: Duration,
        observer: Option<&ReadyObserver>,
    ) -> Readiness {
        // 先订阅再注入监听脚本，避免错过注入后立即派发的事件
        let mut subscription = self.bus.subscribe(event_name, self.job_id.as_str());

        self.events.emit(JobEvent::EventWaitStart {
            event_name: event_name.to_string(),
        });
        info!(
            "[任务 {}] 等待页面事件 '{}' (最长 {:?})",
            self.job_id, event_name, timeout
        );

        // 超时同时覆盖脚本注入和等待，注入卡住时也按时继续
        let script = listener_script(event_name, &self.job_id);
        let received = tokio::time::timeout(timeout, async {
            if let Err(e) = session.eval(&script).await {
                warn!("[任务 {}] 注入事件监听脚本失败: {}", self.job_id, e);
            }
            subscription.recv().await
        })
        .await;
        drop(subscription);

        match received {
            Ok(Some(signal)) => {
                debug!("[任务 {}] 收到页面事件 '{}'", self.job_id, event_name);
                self.events.emit(JobEvent::EventWaitEnd {
                    event_name: event_name.to_string(),
                    detail: signal.detail.clone(),
                });
                if let Some(observer) = observer {
                    self.run_observer(observer, signal.detail.clone()).await;
                }
                Readiness::Signalled {
                    detail: signal.detail,
                }
            }
            Ok(None) | Err(_) => {
                warn!(
                    "[任务 {}] ⚠️ 等待页面事件 '{}' 超时，继续捕获",
                    self.job_id, event_name
                );
                self.events.emit(JobEvent::EventWaitTimeout {
                    event_name: event_name.to_string(),
                });
                Readiness::TimedOut
            }
        }
    }

    async fn run_observer(&self, observer: &ReadyObserver, detail: JsonValue) {
        self.events.emit(JobEvent::ObserverStart {
            detail: detail.clone(),
        });
        match tokio::time::timeout(MAX_OBSERVER_WAIT, observer(detail)).await {
            Ok(()) => {
                self.events.emit(JobEvent::ObserverEnd);
            }
            Err(_) => {
                warn!(
                    "[任务 {}] ⚠️ 就绪观察者超过 {:?} 未完成，继续捕获",
                    self.job_id, MAX_OBSERVER_WAIT
                );
                self.events.emit(JobEvent::ObserverTimeout {
                    timeout: MAX_OBSERVER_WAIT,
                });
            }
        }
    }
}

/// 生成页面事件监听脚本
///
/// 事件在 `document.body` 上派发一次后，通过绑定把 `{eventName, jobId, detail}` 送回。
pub fn listener_script(event_name: &str, job_id: &str) -> String {
    let event_literal = serde_json::to_string(event_name).unwrap_or_else(|_| "\"\"".to_string());
    let job_literal = serde_json::to_string(job_id).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"(() => {{
    const eventName = {event_literal};
    const jobId = {job_literal};
    const target = document.body || document.documentElement;
    target.addEventListener(eventName, (event) => {{
        const detail = event.detail === undefined ? null : event.detail;
        window.{binding}(JSON.stringify({{ eventName, jobId, detail }}));
    }}, {{ once: true }});
    return true;
}})()"#,
        event_literal = event_literal,
        job_literal = job_literal,
        binding = SIGNAL_BINDING,
    )
}
