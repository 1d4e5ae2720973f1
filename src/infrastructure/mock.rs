//! 内存渲染引擎
//!
//! 不启动浏览器，记录每一次引擎调用，供测试断言使用。
//! 注入就绪监听脚本后可按配置延迟发出页面信号。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::{AppError, AppResult, BrowserError};
use crate::infrastructure::engine::{
    CaptureRequest, CookieSpec, RenderEngine, RenderWindow, WindowConfig,
};
use crate::infrastructure::signal_bus::{ReadySignal, SignalBus, SIGNAL_BINDING};
use crate::models::Dimensions;

/// 内存引擎的行为配置
#[derive(Debug, Clone)]
pub struct MockBehaviour {
    /// 注入监听脚本后多久发出页面事件；`None` 表示页面从不发出
    pub signal_after: Option<Duration>,
    /// 页面事件携带的 detail
    pub signal_detail: JsonValue,
    /// 文档捕获返回引擎错误
    pub fail_pdf: bool,
    /// 加载这些 URL 时报告导航失败
    pub fail_load_urls: Vec<String>,
    /// `outerHTML` 脚本返回的页面标记
    pub markup: String,
    /// 脚本执行永不返回
    pub hang_scripts: bool,
    /// 加载永不返回
    pub hang_loads: bool,
    /// 捕获永不返回
    pub hang_capture: bool,
}

impl Default for MockBehaviour {
    fn default() -> Self {
        Self {
            signal_after: None,
            signal_detail: JsonValue::Null,
            fail_pdf: false,
            fail_load_urls: Vec::new(),
            markup: "<html><body>mock</body></html>".to_string(),
            hang_scripts: false,
            hang_loads: false,
            hang_capture: false,
        }
    }
}

/// 内存引擎
pub struct MockEngine {
    bus: SignalBus,
    behaviour: MockBehaviour,
    windows: Mutex<Vec<Arc<MockWindow>>>,
    next_id: AtomicUsize,
}

impl MockEngine {
    pub fn new(bus: SignalBus) -> Self {
        Self::with_behaviour(bus, MockBehaviour::default())
    }

    pub fn with_behaviour(bus: SignalBus, behaviour: MockBehaviour) -> Self {
        Self {
            bus,
            behaviour,
            windows: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
        }
    }

    /// 已创建的所有窗口
    pub fn windows(&self) -> Vec<Arc<MockWindow>> {
        self.windows.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.windows.lock().len()
    }
}

#[async_trait]
impl RenderEngine for MockEngine {
    async fn open(&self, config: &WindowConfig) -> AppResult<Arc<dyn RenderWindow>> {
        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let window = Arc::new(MockWindow::new(
            id,
            config.clone(),
            self.bus.clone(),
            self.behaviour.clone(),
        ));
        self.windows.lock().push(Arc::clone(&window));
        Ok(window)
    }
}

/// 内存窗口
pub struct MockWindow {
    id: String,
    config: WindowConfig,
    bus: SignalBus,
    behaviour: MockBehaviour,
    dimensions: Mutex<Dimensions>,
    destroyed: AtomicBool,
    set_size_calls: AtomicUsize,
    close_calls: AtomicUsize,
    calls: Mutex<Vec<String>>,
    cookies: Mutex<Vec<CookieSpec>>,
    loads: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl MockWindow {
    fn new(id: String, config: WindowConfig, bus: SignalBus, behaviour: MockBehaviour) -> Self {
        let dimensions = Dimensions::new(config.width, config.height);
        Self {
            id,
            config,
            bus,
            behaviour,
            dimensions: Mutex::new(dimensions),
            destroyed: AtomicBool::new(false),
            set_size_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            cookies: Mutex::new(Vec::new()),
            loads: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// 按顺序记录的引擎调用，如 `load:a.html`、`capture:pdf`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn set_size_calls(&self) -> usize {
        self.set_size_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn cookies(&self) -> Vec<CookieSpec> {
        self.cookies.lock().clone()
    }

    pub fn loads(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.loads.lock().clone()
    }

    /// 模拟外部销毁（如渲染进程崩溃）
    pub fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn alive(&self) -> AppResult<()> {
        if self.is_destroyed() {
            return Err(AppError::Browser(BrowserError::WindowDestroyed {
                window_id: self.id.clone(),
            }));
        }
        Ok(())
    }

    fn schedule_signal(&self, script: &str) {
        let Some(delay) = self.behaviour.signal_after else {
            return;
        };
        let (Some(event_name), Some(job_id)) = (
            script_constant(script, "eventName"),
            script_constant(script, "jobId"),
        ) else {
            return;
        };

        let bus = self.bus.clone();
        let detail = self.behaviour.signal_detail.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            bus.publish(ReadySignal::new(event_name, job_id, detail));
        });
    }
}

/// 从注入脚本中读出 `const <name> = "<json 字符串>";`
fn script_constant(script: &str, name: &str) -> Option<String> {
    let pattern = format!(r#"const {} = ("(?:[^"\\]|\\.)*");"#, name);
    let re = Regex::new(&pattern).ok()?;
    let literal = re.captures(script)?.get(1)?.as_str();
    serde_json::from_str(literal).ok()
}

#[async_trait]
impl RenderWindow for MockWindow {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimensions(&self) -> Dimensions {
        *self.dimensions.lock()
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    async fn set_size(&self, dimensions: Dimensions) -> AppResult<()> {
        self.alive()?;
        self.set_size_calls.fetch_add(1, Ordering::SeqCst);
        self.record(format!("resize:{}", dimensions));
        *self.dimensions.lock() = dimensions;
        Ok(())
    }

    async fn set_cookies(&self, cookies: &[CookieSpec]) -> AppResult<()> {
        self.alive()?;
        self.record(format!("cookies:{}", cookies.len()));
        self.cookies.lock().extend_from_slice(cookies);
        Ok(())
    }

    async fn load(&self, url: &str, headers: &[(String, String)]) -> AppResult<()> {
        self.alive()?;
        self.record(format!("load:{}", url));
        self.loads.lock().push((url.to_string(), headers.to_vec()));
        if self.behaviour.hang_loads {
            futures::future::pending::<()>().await;
        }
        if self.behaviour.fail_load_urls.iter().any(|u| u == url) {
            return Err(AppError::navigation_failed(url, "net::ERR_NAME_NOT_RESOLVED"));
        }
        Ok(())
    }

    async fn execute_script(&self, source: &str) -> AppResult<JsonValue> {
        self.alive()?;
        if self.behaviour.hang_scripts {
            self.record("script:hang".to_string());
            futures::future::pending::<()>().await;
        }
        if source.contains(SIGNAL_BINDING) {
            self.record("script:listener".to_string());
            self.schedule_signal(source);
            return Ok(JsonValue::Bool(true));
        }
        if source.contains("outerHTML") {
            self.record("script:markup".to_string());
            return Ok(JsonValue::String(self.behaviour.markup.clone()));
        }
        self.record("script".to_string());
        Ok(JsonValue::Null)
    }

    async fn capture(&self, request: &CaptureRequest) -> AppResult<Vec<u8>> {
        self.alive()?;
        self.record(format!("capture:{}", request.kind_name()));
        if self.behaviour.hang_capture {
            futures::future::pending::<()>().await;
        }
        match request {
            CaptureRequest::Document(_) if self.behaviour.fail_pdf => {
                Err(AppError::capture_failed("pdf", "printing failed"))
            }
            CaptureRequest::Document(_) => Ok(b"%PDF-1.4 mock".to_vec()),
            CaptureRequest::Image => Ok(b"\x89PNG mock".to_vec()),
        }
    }

    async fn close(&self) -> AppResult<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.record("close".to_string());
        Ok(())
    }
}
