//! Chromium 渲染引擎适配器
//!
//! 每个窗口是一个 CDP target；需要 cookie 隔离时放进独立的 browser context。
//! 页面信号通过 `Runtime.addBinding` 绑定跨进程送回，并转发到 [`SignalBus`]。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, PrintToPdfParams};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{Map, Value as JsonValue};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser;
use crate::config::Config;
use crate::error::{AppError, AppResult, BrowserError, CaptureError};
use crate::infrastructure::engine::{
    CaptureRequest, CookieSpec, PdfOptions, RenderEngine, RenderWindow, WindowConfig,
};
use crate::infrastructure::js_executor::JsExecutor;
use crate::infrastructure::signal_bus::{ReadySignal, SignalBus, SIGNAL_BINDING};
use crate::models::{Dimensions, PageSize};

/// 微米与英寸的换算比例
const MICRONS_PER_INCH: f64 = 25_400.0;

/// Chromium 引擎
pub struct ChromiumEngine {
    browser: Arc<RwLock<Browser>>,
    handler_task: JoinHandle<()>,
    bus: SignalBus,
    /// 浏览器由本进程启动（连接到已有浏览器时不负责关闭它）
    launched: bool,
}

impl ChromiumEngine {
    /// 按配置启动浏览器，或连接到已有浏览器
    pub async fn start(config: &Config, bus: SignalBus) -> AppResult<Self> {
        let (browser, handler_task) = match config.browser_debug_port {
            Some(port) => browser::connect_to_browser(port).await?,
            None => browser::launch_browser(config).await?,
        };
        Ok(Self {
            browser: Arc::new(RwLock::new(browser)),
            handler_task,
            bus,
            launched: config.browser_debug_port.is_none(),
        })
    }

    /// 关闭浏览器进程
    pub async fn shutdown(&self) {
        if !self.launched {
            self.handler_task.abort();
            return;
        }
        let mut browser = self.browser.write().await;
        if let Err(e) = browser.close().await {
            warn!("关闭浏览器失败: {}", e);
        }
        if let Err(e) = browser.wait().await {
            debug!("等待浏览器进程退出失败: {}", e);
        }
        self.handler_task.abort();
        info!("浏览器已关闭");
    }

    async fn create_page(&self, config: &WindowConfig) -> AppResult<(Page, Option<BrowserContextId>)> {
        let browser = self.browser.read().await;

        let context_id = if config.partition.is_some() {
            let response = browser
                .execute(CreateBrowserContextParams::default())
                .await
                .map_err(window_open_failed)?;
            Some(response.result.browser_context_id.clone())
        } else {
            None
        };

        let mut params = CreateTargetParams::builder()
            .url("about:blank")
            .background(!config.show);
        if let Some(id) = &context_id {
            params = params.browser_context_id(id.clone());
        }
        let params = params.build().map_err(|reason| {
            AppError::Browser(BrowserError::WindowOpenFailed { reason })
        })?;

        let page = browser.new_page(params).await.map_err(window_open_failed)?;
        Ok((page, context_id))
    }
}

impl Drop for ChromiumEngine {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    async fn open(&self, config: &WindowConfig) -> AppResult<Arc<dyn RenderWindow>> {
        let (page, context_id) = self.create_page(config).await?;
        let dimensions = Dimensions::new(config.width, config.height);
        apply_device_metrics(&page, dimensions).await?;

        page.execute(AddBindingParams::new(SIGNAL_BINDING))
            .await
            .map_err(window_open_failed)?;
        let mut bindings = page
            .event_listener::<EventBindingCalled>()
            .await
            .map_err(window_open_failed)?;

        let bus = self.bus.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = bindings.next().await {
                if event.name != SIGNAL_BINDING {
                    continue;
                }
                match ReadySignal::from_payload(&event.payload) {
                    Some(signal) => {
                        bus.publish(signal);
                    }
                    None => warn!("无法解析页面信号: {}", event.payload),
                }
            }
        });

        let id = page.target_id().as_ref().to_string();
        debug!("窗口 {} 已创建 ({})", id, dimensions);

        Ok(Arc::new(ChromiumWindow {
            id,
            executor: JsExecutor::new(page),
            browser: Arc::clone(&self.browser),
            context_id,
            dimensions: Mutex::new(dimensions),
            destroyed: AtomicBool::new(false),
            forwarder,
        }))
    }
}

/// Chromium 窗口（一个 page target）
pub struct ChromiumWindow {
    id: String,
    executor: JsExecutor,
    browser: Arc<RwLock<Browser>>,
    context_id: Option<BrowserContextId>,
    dimensions: Mutex<Dimensions>,
    destroyed: AtomicBool,
    forwarder: JoinHandle<()>,
}

impl ChromiumWindow {
    fn page(&self) -> &Page {
        self.executor.page()
    }

    fn ensure_alive(&self) -> AppResult<()> {
        if self.is_destroyed() {
            return Err(AppError::Browser(BrowserError::WindowDestroyed {
                window_id: self.id.clone(),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl RenderWindow for ChromiumWindow {
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
        self.ensure_alive()?;
        apply_device_metrics(self.page(), dimensions).await?;
        *self.dimensions.lock() = dimensions;
        Ok(())
    }

    async fn set_cookies(&self, cookies: &[CookieSpec]) -> AppResult<()> {
        self.ensure_alive()?;
        let mut params = Vec::with_capacity(cookies.len());
        for cookie in cookies {
            let param = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .url(cookie.url.clone())
                .build()
                .map_err(|reason| AppError::Browser(BrowserError::Protocol { reason }))?;
            params.push(param);
        }
        self.page().set_cookies(params).await?;
        Ok(())
    }

    async fn load(&self, url: &str, headers: &[(String, String)]) -> AppResult<()> {
        self.ensure_alive()?;

        let header_map: Map<String, JsonValue> = headers
            .iter()
            .map(|(name, value)| (name.clone(), JsonValue::String(value.clone())))
            .collect();
        self.page()
            .execute(SetExtraHttpHeadersParams::new(Headers::new(JsonValue::Object(
                header_map,
            ))))
            .await?;

        self.page()
            .goto(url)
            .await
            .map_err(|e| AppError::navigation_failed(url, e))?;
        Ok(())
    }

    async fn execute_script(&self, source: &str) -> AppResult<JsonValue> {
        self.ensure_alive()?;
        self.executor.eval(source).await
    }

    async fn capture(&self, request: &CaptureRequest) -> AppResult<Vec<u8>> {
        self.ensure_alive()?;
        let bytes = match request {
            CaptureRequest::Document(options) => self
                .page()
                .pdf(print_to_pdf_params(options)?)
                .await
                .map_err(|e| AppError::capture_failed("pdf", e))?,
            CaptureRequest::Image => self
                .page()
                .screenshot(
                    ScreenshotParams::builder()
                        .format(CaptureScreenshotFormat::Png)
                        .full_page(true)
                        .build(),
                )
                .await
                .map_err(|e| AppError::capture_failed("png", e))?,
        };

        if bytes.is_empty() {
            return Err(AppError::Capture(CaptureError::InvalidOutput {
                kind: request.kind_name().to_string(),
            }));
        }
        Ok(bytes)
    }

    async fn close(&self) -> AppResult<()> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.forwarder.abort();

        if let Err(e) = self.page().clone().close().await {
            warn!("关闭窗口 {} 失败: {}", self.id, e);
        }
        if let Some(context_id) = &self.context_id {
            let browser = self.browser.read().await;
            if let Err(e) = browser
                .execute(DisposeBrowserContextParams::new(context_id.clone()))
                .await
            {
                warn!("释放窗口 {} 的浏览器上下文失败: {}", self.id, e);
            }
        }
        debug!("窗口 {} 已关闭", self.id);
        Ok(())
    }
}

fn window_open_failed(err: impl std::fmt::Display) -> AppError {
    AppError::Browser(BrowserError::WindowOpenFailed {
        reason: err.to_string(),
    })
}

async fn apply_device_metrics(page: &Page, dimensions: Dimensions) -> AppResult<()> {
    page.execute(SetDeviceMetricsOverrideParams::new(
        i64::from(dimensions.width),
        i64::from(dimensions.height),
        1.0,
        false,
    ))
    .await?;
    Ok(())
}

/// 把边距类型转换为英寸
fn margin_inches(margins_type: u8) -> f64 {
    match margins_type {
        1 => 0.0,
        2 => 0.1,
        _ => 0.4,
    }
}

fn print_to_pdf_params(options: &PdfOptions) -> AppResult<PrintToPdfParams> {
    let (paper_width, paper_height) = match &options.page_size {
        PageSize::Custom { width, height } => (
            *width as f64 / MICRONS_PER_INCH,
            *height as f64 / MICRONS_PER_INCH,
        ),
        named => named
            .named_inches()
            .ok_or_else(|| AppError::unknown_page_size(named.to_string()))?,
    };

    if options.print_selection_only {
        debug!("Chromium 不支持仅打印选区，忽略 printSelectionOnly");
    }

    let margin = margin_inches(options.margins_type);
    Ok(PrintToPdfParams {
        landscape: Some(options.landscape),
        print_background: Some(options.print_background),
        paper_width: Some(paper_width),
        paper_height: Some(paper_height),
        margin_top: Some(margin),
        margin_bottom: Some(margin),
        margin_left: Some(margin),
        margin_right: Some(margin),
        ..Default::default()
    })
}
