//! 资源处理流程 - 流程层
//!
//! 核心职责：定义"一个资源"的完整处理流程
//!
//! 流程顺序：
//! 1. 按纸张和方向调整窗口
//! 2. 加载资源（失败或超时只发出事件，继续后续步骤）
//! 3. 等待页面就绪
//! 4. 重新读取工作配置，捕获输出
//!
//! 工作配置由任务持有；就绪观察者可以在等待期间修改它，捕获使用修改后的值。

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::events::{EventEmitter, JobEvent};
use crate::infrastructure::{RendererSession, SignalBus};
use crate::models::{CaptureResult, RenderConfig};
use crate::services::capture::target_file;
use crate::services::{geometry, request};
use crate::services::{CaptureGuard, CaptureService, FileSuffix, ReadinessCoordinator, ReadyObserver};
use crate::utils::logging;
use crate::workflow::resource_ctx::ResourceCtx;

/// 单次加载的上限
pub const LOAD_TIMEOUT: Duration = Duration::from_millis(60_000);

/// 资源处理流程
///
/// - 编排单个资源的处理步骤
/// - 不持有窗口（窗口属于任务）
/// - 返回 `Err` 只代表配置错误，任务应就此结束；捕获失败放在结果里
pub struct ResourceFlow {
    events: Arc<EventEmitter>,
    readiness: ReadinessCoordinator,
    capture: CaptureService,
    guard: CaptureGuard,
    file_suffix: Option<FileSuffix>,
}

impl ResourceFlow {
    pub fn new(
        bus: SignalBus,
        events: Arc<EventEmitter>,
        job_id: &str,
        in_memory: bool,
        file_suffix: Option<FileSuffix>,
    ) -> Self {
        Self {
            readiness: ReadinessCoordinator::new(bus, Arc::clone(&events), job_id),
            capture: CaptureService::new(Arc::clone(&events), job_id, in_memory),
            guard: CaptureGuard::new(),
            file_suffix,
            events,
        }
    }

    pub async fn run(
        &self,
        session: &RendererSession,
        working: &Mutex<RenderConfig>,
        ctx: &ResourceCtx,
        observer: Option<&ReadyObserver>,
    ) -> AppResult<CaptureResult> {
        self.guard.reset();
        let config = working.lock().clone();

        // ========== 1. 调整窗口 ==========
        if let Some(dimensions) =
            geometry::set_window_dimensions(session, &config.page_size, config.landscape).await?
        {
            self.events.emit(JobEvent::WindowResize { dimensions });
        }

        // ========== 2. 加载 ==========
        let headers = request::request_headers(&config)?;
        info!("{} 📄 加载 {}", ctx, logging::truncate_text(&ctx.url, 120));
        self.events.emit(JobEvent::LoadStart {
            index: ctx.index,
            url: ctx.url.clone(),
        });
        let loaded = match tokio::time::timeout(LOAD_TIMEOUT, session.load(&ctx.url, &headers)).await {
            Ok(loaded) => loaded,
            Err(_) => Err(AppError::timed_out(format!("加载 {}", ctx.url), LOAD_TIMEOUT)),
        };
        match loaded {
            Ok(()) => {
                self.events.emit(JobEvent::LoadEnd {
                    index: ctx.index,
                    url: ctx.url.clone(),
                });
            }
            Err(e) => {
                warn!("{} ⚠️ 加载失败，继续捕获: {}", ctx, e);
                self.events.emit(JobEvent::LoadFailed {
                    index: ctx.index,
                    url: ctx.url.clone(),
                    error: e,
                });
            }
        }

        // ========== 3. 等待就绪 ==========
        self.readiness.wait(session, &config, observer).await;

        // ========== 4. 捕获 ==========
        let config = working.lock().clone();
        let target = target_file(
            &ctx.output,
            ctx.index,
            ctx.total,
            config.output_type,
            self.file_suffix.as_ref(),
        );
        self.capture
            .capture(&self.guard, session, &config, ctx.index, &target)
            .await
            .ok_or_else(|| AppError::Other(format!("{} 捕获守卫已被占用", ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::{MockBehaviour, MockEngine};
    use crate::infrastructure::{RenderEngine, WindowConfig};
    use std::path::PathBuf;

    async fn fixture(behaviour: MockBehaviour) -> (MockEngine, RendererSession, Arc<EventEmitter>, ResourceFlow) {
        let bus = SignalBus::new();
        let engine = MockEngine::with_behaviour(bus.clone(), behaviour);
        let window = engine
            .open(&WindowConfig {
                width: 796,
                height: 1123,
                show: false,
                partition: None,
            })
            .await
            .unwrap();
        let events = Arc::new(EventEmitter::new());
        let flow = ResourceFlow::new(bus, Arc::clone(&events), "job-1", true, None);
        (engine, RendererSession::new(window), events, flow)
    }

    fn ctx(url: &str) -> ResourceCtx {
        ResourceCtx::new("job-1".into(), 0, 1, url.into(), PathBuf::from("out.pdf"))
    }

    #[tokio::test]
    async fn load_failure_still_captures() {
        let (engine, session, events, flow) = fixture(MockBehaviour {
            fail_load_urls: vec!["https://bad.invalid/".into()],
            ..Default::default()
        })
        .await;
        let mut rx = events.subscribe();

        let result = flow
            .run(&session, &Mutex::new(RenderConfig::default()), &ctx("https://bad.invalid/"), None)
            .await
            .unwrap();

        assert!(result.is_success());
        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        assert!(names.contains(&"window.load.failed"));
        assert!(!names.contains(&"window.load.end"));
        assert!(engine.windows()[0].calls().contains(&"capture:pdf".to_string()));
    }

    #[tokio::test]
    async fn headers_are_sent_with_load() {
        let (engine, session, _events, flow) = fixture(MockBehaviour::default()).await;
        let config = RenderConfig {
            disable_cache: true,
            ..Default::default()
        };

        flow.run(&session, &Mutex::new(config), &ctx("https://example.com/"), None)
            .await
            .unwrap();

        let loads = engine.windows()[0].loads();
        assert_eq!(loads[0].1, vec![("pragma".to_string(), "no-cache".to_string())]);
    }

    #[tokio::test]
    async fn malformed_headers_stop_before_loading() {
        let (engine, session, _events, flow) = fixture(MockBehaviour::default()).await;
        let config = RenderConfig {
            request_headers: Some("[1, 2".into()),
            ..Default::default()
        };

        let err = flow
            .run(&session, &Mutex::new(config), &ctx("https://example.com/"), None)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(engine.windows()[0].loads().is_empty());
    }

    #[tokio::test]
    async fn landscape_resizes_window() {
        let (engine, session, events, flow) = fixture(MockBehaviour::default()).await;
        let mut rx = events.subscribe();
        let config = RenderConfig {
            landscape: true,
            ..Default::default()
        };

        flow.run(&session, &Mutex::new(config), &ctx("https://example.com/"), None)
            .await
            .unwrap();

        assert_eq!(engine.windows()[0].set_size_calls(), 1);
        assert_eq!(rx.recv().await.unwrap().name(), "window.resize");
    }

    #[tokio::test(start_paused = true)]
    async fn hung_load_times_out_and_still_captures() {
        let (engine, session, events, flow) = fixture(MockBehaviour {
            hang_loads: true,
            ..Default::default()
        })
        .await;
        let mut rx = events.subscribe();

        let result = flow
            .run(&session, &Mutex::new(RenderConfig::default()), &ctx("https://slow.example.com/"), None)
            .await
            .unwrap();

        assert!(result.is_success());
        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        assert!(names.contains(&"window.load.failed"));
        assert!(engine.windows()[0].calls().contains(&"capture:pdf".to_string()));
    }
}
