//! 捕获服务 - 业务能力层
//!
//! 只负责"把当前页面变成输出"：按类型分派、写文件或返回字节。
//! 不关心资源顺序，也不关心页面何时就绪。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};
use crate::events::{EventEmitter, JobEvent};
use crate::infrastructure::{CaptureRequest, PdfOptions, RendererSession};
use crate::models::{CaptureResult, OutputKind, RenderConfig};

/// 截图前的稳定等待，留给合成器完成最后一帧
pub const IMAGE_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// 单次捕获（含图片稳定延迟）的上限
pub const CAPTURE_TIMEOUT: Duration = Duration::from_millis(60_000);

/// 读取页面标记的脚本
const MARKUP_SCRIPT: &str = "document.documentElement.outerHTML";

/// 自定义输出文件后缀，参数为资源序号（从 0 开始）
pub type FileSuffix = Arc<dyn Fn(usize) -> String + Send + Sync>;

/// 单次捕获守卫
///
/// 每个资源开始前重置；同一资源的多条就绪路径（事件、超时）只有第一条能触发捕获。
#[derive(Debug, Default)]
pub struct CaptureGuard {
    claimed: AtomicBool,
}

impl CaptureGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试占用；已被占用时返回 `false`
    pub fn try_claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.claimed.store(false, Ordering::SeqCst);
    }
}

/// 计算资源的输出文件
///
/// - 单个资源：使用目标路径本身
/// - 多个资源：`<base>_<n>.<ext>`，n 从 1 开始；提供 `suffix` 时替换 `_<n>`
/// - 没有扩展名的多资源目标按 PDF 命名
/// - 显式指定类型时替换扩展名
pub fn target_file(
    base: &Path,
    index: usize,
    total: usize,
    explicit: Option<OutputKind>,
    suffix: Option<&FileSuffix>,
) -> PathBuf {
    if total <= 1 {
        return match explicit {
            Some(kind) => base.with_extension(kind.extension()),
            None => base.to_path_buf(),
        };
    }

    let extension = match explicit {
        Some(kind) => kind.extension().to_string(),
        None => base
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| OutputKind::Pdf.extension().to_string()),
    };
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let marker = match suffix {
        Some(suffix) => suffix(index),
        None => format!("_{}", index + 1),
    };
    let file_name = format!("{}{}.{}", stem, marker, extension);
    base.with_file_name(file_name)
}

/// 由工作配置组装 PDF 参数
pub fn pdf_options(config: &RenderConfig) -> PdfOptions {
    PdfOptions {
        margins_type: config.margins_type,
        print_background: config.print_background,
        print_selection_only: config.print_selection_only,
        page_size: config.page_size.clone(),
        landscape: config.landscape,
    }
}

/// 捕获服务
///
/// 职责：
/// - 按输出类型调用引擎
/// - 引擎失败时不写文件，把错误放进该资源的结果
/// - 发出 `window.capture.start` / `window.capture.end`
pub struct CaptureService {
    events: Arc<EventEmitter>,
    job_id: String,
    in_memory: bool,
}

impl CaptureService {
    pub fn new(events: Arc<EventEmitter>, job_id: impl Into<String>, in_memory: bool) -> Self {
        Self {
            events,
            job_id: job_id.into(),
            in_memory,
        }
    }

    /// 捕获一个资源
    ///
    /// 守卫已被占用时返回 `None`，不做任何事。
    pub async fn capture(
        &self,
        guard: &CaptureGuard,
        session: &RendererSession,
        config: &RenderConfig,
        index: usize,
        target: &Path,
    ) -> Option<CaptureResult> {
        if !guard.try_claim() {
            debug!("[任务 {}] 资源 {} 已捕获，忽略重复触发", self.job_id, index + 1);
            return None;
        }

        self.events.emit(JobEvent::CaptureStart { index });
        let kind = OutputKind::resolve(config.output_type, target);
        debug!("[任务 {}] 捕获资源 {} ({})", self.job_id, index + 1, kind);

        let produced = match tokio::time::timeout(CAPTURE_TIMEOUT, self.produce(session, config, kind)).await {
            Ok(produced) => produced,
            Err(_) => Err(AppError::timed_out(format!("生成 {}", kind), CAPTURE_TIMEOUT)),
        };
        let result = match produced {
            Ok(bytes) => self.deliver(index, target, bytes).await,
            Err(e) => {
                error!("[任务 {}] ❌ 资源 {} 生成 {} 失败: {}", self.job_id, index + 1, kind, e);
                CaptureResult::failed(index, None, e)
            }
        };

        self.events.emit(JobEvent::CaptureEnd {
            index,
            file: result.target_file.clone(),
            data: result.data.clone(),
            error: result.error.clone(),
        });
        Some(result)
    }

    async fn produce(
        &self,
        session: &RendererSession,
        config: &RenderConfig,
        kind: OutputKind,
    ) -> AppResult<Vec<u8>> {
        match kind {
            OutputKind::Pdf => {
                session
                    .capture(&CaptureRequest::Document(pdf_options(config)))
                    .await
            }
            OutputKind::Png => {
                tokio::time::sleep(IMAGE_SETTLE_DELAY).await;
                session.capture(&CaptureRequest::Image).await
            }
            OutputKind::Html => {
                let markup: String = session.eval_as(MARKUP_SCRIPT).await?;
                Ok(markup.into_bytes())
            }
        }
    }

    async fn deliver(&self, index: usize, target: &Path, bytes: Vec<u8>) -> CaptureResult {
        if self.in_memory {
            return CaptureResult::in_memory(index, Arc::from(bytes));
        }

        let absolute = absolute_path(target);
        match tokio::fs::write(&absolute, &bytes).await {
            Ok(()) => {
                info!(
                    "[任务 {}] ✓ 已写入 {} ({} 字节)",
                    self.job_id,
                    absolute.display(),
                    bytes.len()
                );
                CaptureResult::written(index, absolute)
            }
            Err(e) => {
                warn!("[任务 {}] 写入 {} 失败: {}", self.job_id, absolute.display(), e);
                let error = AppError::file_write_failed(absolute.display().to_string(), e);
                CaptureResult::failed(index, Some(absolute), error)
            }
        }
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::{MockBehaviour, MockEngine};
    use crate::infrastructure::{RenderEngine, SignalBus, WindowConfig};

    async fn session_with(behaviour: MockBehaviour) -> (MockEngine, RendererSession) {
        let engine = MockEngine::with_behaviour(SignalBus::new(), behaviour);
        let window = engine
            .open(&WindowConfig {
                width: 800,
                height: 600,
                show: false,
                partition: None,
            })
            .await
            .unwrap();
        (engine, RendererSession::new(window))
    }

    #[test]
    fn guard_claims_once_until_reset() {
        let guard = CaptureGuard::new();
        assert!(guard.try_claim());
        assert!(!guard.try_claim());
        guard.reset();
        assert!(guard.try_claim());
    }

    #[test]
    fn single_resource_uses_exact_target() {
        let base = Path::new("out/report.pdf");
        assert_eq!(target_file(base, 0, 1, None, None), PathBuf::from("out/report.pdf"));
        assert_eq!(
            target_file(base, 0, 1, Some(OutputKind::Png), None),
            PathBuf::from("out/report.png")
        );
    }

    #[test]
    fn multiple_resources_are_numbered_from_one() {
        let base = Path::new("out/report.pdf");
        assert_eq!(target_file(base, 0, 3, None, None), PathBuf::from("out/report_1.pdf"));
        assert_eq!(target_file(base, 2, 3, None, None), PathBuf::from("out/report_3.pdf"));
        assert_eq!(
            target_file(base, 1, 3, Some(OutputKind::Html), None),
            PathBuf::from("out/report_2.html")
        );
    }

    #[test]
    fn custom_suffix_replaces_number() {
        let suffix: FileSuffix = Arc::new(|i| format!("-page{:02}", i));
        let base = Path::new("report.png");
        assert_eq!(target_file(base, 4, 6, None, Some(&suffix)), PathBuf::from("report-page04.png"));
    }

    #[tokio::test]
    async fn pdf_is_written_to_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("page.pdf");
        let (_engine, session) = session_with(MockBehaviour::default()).await;
        let events = Arc::new(EventEmitter::new());
        let mut rx = events.subscribe();
        let service = CaptureService::new(Arc::clone(&events), "job-1", false);
        let guard = CaptureGuard::new();

        let result = service
            .capture(&guard, &session, &RenderConfig::default(), 0, &target)
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.target_file.as_deref(), Some(target.as_path()));
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.4 mock");
        assert_eq!(rx.recv().await.unwrap().name(), "window.capture.start");
        assert_eq!(rx.recv().await.unwrap().name(), "window.capture.end");
    }

    #[tokio::test]
    async fn second_trigger_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("page.pdf");
        let (engine, session) = session_with(MockBehaviour::default()).await;
        let service = CaptureService::new(Arc::new(EventEmitter::new()), "job-1", false);
        let guard = CaptureGuard::new();
        let config = RenderConfig::default();

        assert!(service.capture(&guard, &session, &config, 0, &target).await.is_some());
        assert!(service.capture(&guard, &session, &config, 0, &target).await.is_none());
        let captures = engine.windows()[0]
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("capture"))
            .count();
        assert_eq!(captures, 1);
    }

    #[tokio::test]
    async fn engine_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("page.pdf");
        let (_engine, session) = session_with(MockBehaviour {
            fail_pdf: true,
            ..Default::default()
        })
        .await;
        let service = CaptureService::new(Arc::new(EventEmitter::new()), "job-1", false);

        let result = service
            .capture(&CaptureGuard::new(), &session, &RenderConfig::default(), 0, &target)
            .await
            .unwrap();

        assert!(result.error.is_some());
        assert!(!target.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_capture_fails_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("page.pdf");
        let (_engine, session) = session_with(MockBehaviour {
            hang_capture: true,
            ..Default::default()
        })
        .await;
        let service = CaptureService::new(Arc::new(EventEmitter::new()), "job-1", false);

        let result = service
            .capture(&CaptureGuard::new(), &session, &RenderConfig::default(), 0, &target)
            .await
            .unwrap();

        assert!(matches!(
            result.error,
            Some(AppError::Browser(crate::error::BrowserError::Timeout { .. }))
        ));
        assert!(!target.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn in_memory_png_returns_bytes() {
        let (engine, session) = session_with(MockBehaviour::default()).await;
        let events = Arc::new(EventEmitter::new());
        let mut rx = events.subscribe();
        let service = CaptureService::new(Arc::clone(&events), "job-1", true);

        let result = service
            .capture(
                &CaptureGuard::new(),
                &session,
                &RenderConfig::default(),
                0,
                Path::new("shot.png"),
            )
            .await
            .unwrap();

        assert_eq!(result.data.as_deref(), Some(&b"\x89PNG mock"[..]));
        assert!(result.target_file.is_none());
        assert!(engine.windows()[0].calls().contains(&"capture:png".to_string()));
        rx.recv().await.unwrap();
        match rx.recv().await.unwrap() {
            JobEvent::CaptureEnd { data, file, .. } => {
                assert!(data.is_some());
                assert!(file.is_none());
            }
            other => panic!("unexpected event {}", other.name()),
        }
    }

    #[tokio::test]
    async fn html_type_reads_markup() {
        let (_engine, session) = session_with(MockBehaviour {
            markup: "<html><body>hi</body></html>".into(),
            ..Default::default()
        })
        .await;
        let service = CaptureService::new(Arc::new(EventEmitter::new()), "job-1", true);
        let config = RenderConfig {
            output_type: Some(OutputKind::Html),
            ..Default::default()
        };

        let result = service
            .capture(&CaptureGuard::new(), &session, &config, 0, Path::new("out.pdf"))
            .await
            .unwrap();
        assert_eq!(result.data.as_deref(), Some(&b"<html><body>hi</body></html>"[..]));
    }
}
