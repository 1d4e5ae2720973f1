//! 导出任务 - 编排层
//!
//! ## 职责
//!
//! 一个任务把一组有序资源依次渲染到同一个窗口中：
//!
//! 1. **窗口管理**：创建（或复用）窗口，登记到清理器，结束时关闭
//! 2. **顺序处理**：每个资源开始前恢复工作配置、刷新清理器时间，再委托 `ResourceFlow`
//! 3. **结果汇总**：按输入顺序收集结果，第一个错误作为任务错误
//! 4. **事件通知**：通过 `subscribe()` 暴露生命周期事件
//!
//! 任务内部严格串行；不同任务之间互不影响，各自拥有窗口和 cookie 分区。

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult, BrowserError};
use crate::events::{EventEmitter, JobEvent};
use crate::infrastructure::{RenderEngine, RendererSession, SignalBus};
use crate::models::{CaptureResult, JobReport, Orientation, RenderConfig};
use crate::orchestrator::janitor::{Reapable, WindowJanitor};
use crate::services::{geometry, request, FileSuffix, ReadyObserver};
use crate::workflow::{ResourceCtx, ResourceFlow};

/// 默认窗口寿命
pub const DEFAULT_WINDOW_LIFESPAN: Duration = Duration::from_millis(1000 * 60 * 5);

/// 任务选项
#[derive(Clone)]
pub struct JobOptions {
    /// 完成后关闭窗口
    pub close_window: bool,
    /// 不写文件，在结果中返回字节
    pub in_memory: bool,
    /// 每个资源的方向；长度与资源数不一致时按 `landscape` 推导
    pub orientations: Option<Vec<Orientation>>,
    /// 窗口闲置多久后由清理器回收；`None` 时由创建者决定（直接构造时为 [`DEFAULT_WINDOW_LIFESPAN`]）
    pub window_lifespan: Option<Duration>,
    /// 多资源输出的文件后缀
    pub file_suffix: Option<FileSuffix>,
    /// 复用已有窗口，而不是新建
    pub window: Option<RendererSession>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            close_window: true,
            in_memory: false,
            orientations: None,
            window_lifespan: None,
            file_suffix: None,
            window: None,
        }
    }
}

/// 任务依赖的共享资源
#[derive(Clone)]
pub struct JobContext {
    pub engine: Arc<dyn RenderEngine>,
    pub bus: SignalBus,
    pub janitor: WindowJanitor,
}

/// 导出任务
///
/// 克隆只复制句柄。
#[derive(Clone)]
pub struct ExportJob {
    inner: Arc<JobInner>,
}

struct JobInner {
    id: String,
    resources: Vec<String>,
    output: PathBuf,
    /// 构造时的配置快照，不再修改
    config: RenderConfig,
    /// 当前资源的工作配置；每个资源开始前从快照恢复
    working: Mutex<RenderConfig>,
    orientations: Vec<Orientation>,
    window_lifespan: Duration,
    options: JobOptions,
    ctx: JobContext,
    events: Arc<EventEmitter>,
    session: Mutex<Option<RendererSession>>,
    observer: Mutex<Option<ReadyObserver>>,
    destroyed: AtomicBool,
}

impl ExportJob {
    /// 创建任务
    ///
    /// `resources` 必须是可以直接加载的 URL（见 [`crate::services::SourceResolver`]）。
    pub fn new(
        resources: Vec<String>,
        output: impl Into<PathBuf>,
        config: RenderConfig,
        options: JobOptions,
        ctx: JobContext,
    ) -> Self {
        let orientations = derive_orientations(&config, options.orientations.as_deref(), resources.len());
        let window_lifespan = options.window_lifespan.unwrap_or(DEFAULT_WINDOW_LIFESPAN);
        Self {
            inner: Arc::new(JobInner {
                id: Uuid::new_v4().to_string(),
                resources,
                output: output.into(),
                working: Mutex::new(config.clone()),
                config,
                orientations,
                window_lifespan,
                options,
                ctx,
                events: Arc::new(EventEmitter::new()),
                session: Mutex::new(None),
                observer: Mutex::new(None),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn resources(&self) -> &[String] {
        &self.inner.resources
    }

    pub fn orientations(&self) -> &[Orientation] {
        &self.inner.orientations
    }

    /// 构造时的配置快照
    pub fn config(&self) -> &RenderConfig {
        &self.inner.config
    }

    /// 当前资源的工作配置
    pub fn working_config(&self) -> RenderConfig {
        self.inner.working.lock().clone()
    }

    pub fn window_lifespan(&self) -> Duration {
        self.inner.window_lifespan
    }

    /// 当前窗口（尚未创建或已关闭时为 `None`）
    pub fn session(&self) -> Option<RendererSession> {
        self.inner.session.lock().clone()
    }

    /// 订阅任务事件；应在 `render()` 之前调用，否则会错过早期事件
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// 在后台开始渲染，立即返回
    pub fn render(&self) -> JoinHandle<JobReport> {
        let job = self.clone();
        tokio::spawn(async move { job.run().await })
    }

    /// 渲染并等待完成
    pub async fn run(&self) -> JobReport {
        self.inner.execute().await
    }

    /// 注册就绪观察者：收到页面事件后、捕获之前调用
    pub fn observe_ready_event<F, Fut>(&self, handler: F)
    where
        F: Fn(JsonValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let observer: ReadyObserver = Arc::new(move |detail| handler(detail).boxed());
        *self.inner.observer.lock() = Some(observer);
    }

    /// 修改工作配置中的一项
    ///
    /// 只对当前资源余下的步骤生效（通常在就绪观察者中调用，影响随后的捕获）；
    /// 下一个资源开始时从快照恢复。
    pub fn change_config_value(&self, key: &str, value: JsonValue) -> AppResult<()> {
        self.inner.working.lock().set_value(key, value)
    }

    /// 释放窗口；重复调用无副作用
    pub async fn destroy(&self) {
        self.inner.release().await;
    }
}

impl JobInner {
    async fn execute(self: &Arc<Self>) -> JobReport {
        let total = self.resources.len();
        self.events.emit(JobEvent::RenderStart {
            job_id: self.id.clone(),
            resources: total,
        });
        info!("[任务 {}] 🚀 开始渲染 {} 个资源", self.id, total);

        let mut results: Vec<CaptureResult> = Vec::with_capacity(total);
        let mut first_error: Option<AppError> = None;

        match self.ensure_session().await {
            Ok(session) => {
                let flow = ResourceFlow::new(
                    self.ctx.bus.clone(),
                    Arc::clone(&self.events),
                    &self.id,
                    self.options.in_memory,
                    self.options.file_suffix.clone(),
                );
                for (index, url) in self.resources.iter().enumerate() {
                    if self.destroyed.load(Ordering::SeqCst) {
                        warn!("[任务 {}] 窗口已被释放，停止处理剩余资源", self.id);
                        first_error.get_or_insert(AppError::Browser(BrowserError::WindowDestroyed {
                            window_id: session.id().to_string(),
                        }));
                        break;
                    }
                    self.ctx.janitor.touch(session.id());

                    {
                        let mut working = self.working.lock();
                        *working = self.config.clone();
                        working.landscape = self.orientations[index].is_landscape();
                    }

                    let ctx = ResourceCtx::new(self.id.clone(), index, total, url.clone(), self.output.clone());
                    let observer = self.observer.lock().clone();

                    match flow.run(&session, &self.working, &ctx, observer.as_ref()).await {
                        Ok(result) => {
                            if let Some(e) = &result.error {
                                first_error.get_or_insert_with(|| e.clone());
                            }
                            self.events.emit(JobEvent::ExportComplete {
                                result: result.clone(),
                            });
                            results.push(result);
                        }
                        Err(e) => {
                            error!("{} ❌ 配置错误，任务终止: {}", ctx, e);
                            first_error.get_or_insert(e);
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!("[任务 {}] ❌ 无法准备窗口: {}", self.id, e);
                first_error = Some(e);
            }
        }

        // 准备窗口失败时窗口可能已经打开，同样需要关闭
        if self.options.close_window {
            self.release().await;
        }

        let report = JobReport {
            job_id: self.id.clone(),
            results,
            error: first_error,
        };
        info!(
            "[任务 {}] ✓ 完成: 成功 {}/{}",
            self.id,
            report.succeeded(),
            total
        );
        self.events.emit(JobEvent::JobComplete {
            report: report.clone(),
        });
        report
    }

    /// 创建或复用窗口，登记到清理器并设置 cookie
    async fn ensure_session(self: &Arc<Self>) -> AppResult<RendererSession> {
        let first_url = self
            .resources
            .first()
            .ok_or(crate::error::ConfigError::NoResources)?;
        let config = &self.config;

        let existing = self.session.lock().clone().or_else(|| self.options.window.clone());
        let session = match existing {
            Some(session) => session,
            None => {
                let landscape = self.orientations[0].is_landscape();
                let dimensions = geometry::page_dimensions(&config.page_size, landscape)?;
                let partition = config
                    .cookies
                    .as_ref()
                    .filter(|c| !c.trim().is_empty())
                    .map(|_| format!("job-{}", self.id));
                let window_config = request::window_config(config, dimensions, partition);

                info!(
                    "[任务 {}] 打开窗口 {}x{}",
                    self.id, window_config.width, window_config.height
                );
                self.events.emit(JobEvent::WindowOpenStart);
                let window = self.ctx.engine.open(&window_config).await?;
                let session = RendererSession::new(window);
                self.events.emit(JobEvent::WindowOpenEnd {
                    window_id: session.id().to_string(),
                    dimensions: session.dimensions(),
                });
                session
            }
        };

        *self.session.lock() = Some(session.clone());
        let owner: Arc<dyn Reapable> = Arc::clone(self) as Arc<dyn Reapable>;
        self.ctx
            .janitor
            .register(session.id(), owner, self.window_lifespan);

        if let Some(cookies) = config.cookies.as_deref().filter(|c| !c.trim().is_empty()) {
            // 只支持单一源：所有 cookie 归属第一个资源的源
            let specs = request::parse_cookies(cookies, first_url)?;
            session.set_cookies(&specs).await?;
        }

        Ok(session)
    }

    /// 关闭并注销窗口
    async fn release(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        let Some(session) = self.session.lock().take() else {
            return;
        };
        self.ctx.janitor.remove(session.id());
        if let Err(e) = session.close().await {
            warn!("[任务 {}] 关闭窗口 {} 失败: {}", self.id, session.id(), e);
        }
    }
}

#[async_trait]
impl Reapable for JobInner {
    fn is_window_destroyed(&self) -> bool {
        match self.session.lock().as_ref() {
            Some(session) => session.is_destroyed(),
            None => true,
        }
    }

    fn emit_termination(&self, window_id: &str, lifespan: Duration) {
        warn!(
            "[任务 {}] 窗口 {} 闲置 {:?}，被强制回收",
            self.id, window_id, lifespan
        );
        self.events.emit(JobEvent::WindowTermination {
            window_id: window_id.to_string(),
            lifespan,
        });
    }

    async fn destroy(&self) {
        self.release().await;
    }
}

/// 计算每个资源的方向
///
/// 显式给出且长度匹配时直接使用；否则按 `landscape` 复制到资源数量。
fn derive_orientations(
    config: &RenderConfig,
    explicit: Option<&[Orientation]>,
    count: usize,
) -> Vec<Orientation> {
    match explicit {
        Some(list) if list.len() == count => list.to_vec(),
        Some(list) => {
            warn!(
                "方向数量 ({}) 与资源数量 ({}) 不一致，改用 landscape 配置",
                list.len(),
                count
            );
            vec![Orientation::from_landscape(config.landscape); count]
        }
        None => vec![Orientation::from_landscape(config.landscape); count],
    }
}
