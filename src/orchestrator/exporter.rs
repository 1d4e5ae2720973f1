//! 导出器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个库的入口，负责进程级资源和批量任务：
//!
//! 1. **资源管理**：持有渲染引擎、信号总线、窗口清理器及其后台任务
//! 2. **任务创建**：解析输入源（Markdown 转换、本地路径），构造 `ExportJob`
//! 3. **并发控制**：批量运行清单时用 Semaphore 限制同时渲染的任务数
//! 4. **全局统计**：汇总所有任务的结果

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppResult, ConfigError};
use crate::infrastructure::{ChromiumEngine, RenderEngine, SignalBus};
use crate::models::{JobManifest, JobReport, RenderConfig};
use crate::orchestrator::export_job::{ExportJob, JobContext, JobOptions};
use crate::orchestrator::janitor::WindowJanitor;
use crate::services::SourceResolver;
use crate::utils::logging;

/// 批量处理统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    /// 非弹性模式下因前面的失败而未启动的任务
    pub skipped: usize,
}

/// 导出器
pub struct Exporter {
    config: Config,
    engine: Arc<dyn RenderEngine>,
    /// 由本进程管理的 Chromium；注入自定义引擎时为空
    chromium: Option<Arc<ChromiumEngine>>,
    bus: SignalBus,
    janitor: WindowJanitor,
    janitor_task: Mutex<Option<JoinHandle<()>>>,
    sources: SourceResolver,
}

impl Exporter {
    /// 启动 Chromium 并开始清理器
    pub async fn start(config: Config) -> AppResult<Self> {
        logging::log_startup(&config);

        let bus = SignalBus::new();
        let chromium = Arc::new(ChromiumEngine::start(&config, bus.clone()).await?);
        let engine: Arc<dyn RenderEngine> = chromium.clone();

        let mut exporter = Self::with_engine(config, engine, bus);
        exporter.chromium = Some(chromium);
        Ok(exporter)
    }

    /// 使用指定引擎创建导出器；引擎必须把页面信号发布到 `bus`
    pub fn with_engine(config: Config, engine: Arc<dyn RenderEngine>, bus: SignalBus) -> Self {
        let janitor = WindowJanitor::new();
        let janitor_task = janitor.spawn(config.janitor_interval);
        Self {
            config,
            engine,
            chromium: None,
            bus,
            janitor,
            janitor_task: Mutex::new(Some(janitor_task)),
            sources: SourceResolver::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn janitor(&self) -> &WindowJanitor {
        &self.janitor
    }

    /// 创建任务
    ///
    /// 输入按顺序解析为 URL；未指定 `options.window_lifespan` 时使用进程配置中的窗口寿命。
    pub async fn create_job(
        &self,
        inputs: &[String],
        output: impl Into<PathBuf>,
        config: RenderConfig,
        mut options: JobOptions,
    ) -> AppResult<ExportJob> {
        if inputs.is_empty() {
            return Err(ConfigError::NoResources.into());
        }
        let resources = self.sources.resolve(inputs, &config.css).await?;

        options
            .window_lifespan
            .get_or_insert(self.config.window_life_threshold);

        Ok(ExportJob::new(
            resources,
            output,
            config,
            options,
            JobContext {
                engine: Arc::clone(&self.engine),
                bus: self.bus.clone(),
                janitor: self.janitor.clone(),
            },
        ))
    }

    /// 由清单创建任务并运行到结束
    pub async fn run_manifest(&self, manifest: &JobManifest) -> AppResult<JobReport> {
        let options = JobOptions {
            close_window: manifest.close_window,
            orientations: manifest.orientations.clone(),
            ..Default::default()
        };
        let job = self
            .create_job(&manifest.inputs, &manifest.output, manifest.config.clone(), options)
            .await?;
        Ok(job.run().await)
    }

    /// 并发运行所有清单
    ///
    /// 同时运行的任务数不超过 `max_concurrent_jobs`。非弹性模式下，
    /// 出现失败后不再启动新的任务。
    pub async fn run_all(self: &Arc<Self>, manifests: Vec<JobManifest>) -> BatchStats {
        let total = manifests.len();
        let mut stats = BatchStats {
            total,
            ..Default::default()
        };
        if total == 0 {
            warn!("⚠️ 没有找到待处理的任务清单");
            return stats;
        }
        logging::log_jobs_loaded(total, self.config.max_concurrent_jobs);

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_jobs.max(1)));
        let aborted = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(total);

        for (idx, manifest) in manifests.into_iter().enumerate() {
            let job_index = idx + 1;
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("[清单 {}] 无法获取并发许可: {}", job_index, e);
                    stats.failed += 1;
                    continue;
                }
            };
            if aborted.load(Ordering::SeqCst) {
                stats.skipped += 1;
                continue;
            }

            let exporter = Arc::clone(self);
            let aborted = Arc::clone(&aborted);
            let resilient = self.config.resilient;
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let name = manifest.display_name();
                let ok = match exporter.run_manifest(&manifest).await {
                    Ok(report) => {
                        logging::log_job_report(job_index, &name, &report);
                        report.error.is_none()
                    }
                    Err(e) => {
                        error!("[清单 {}] ❌ {} 处理失败: {}", job_index, name, e);
                        false
                    }
                };
                if !ok && !resilient {
                    aborted.store(true, Ordering::SeqCst);
                }
                ok
            });
            handles.push((job_index, handle));
        }

        for (job_index, handle) in handles {
            match handle.await {
                Ok(true) => stats.success += 1,
                Ok(false) => stats.failed += 1,
                Err(e) => {
                    error!("[清单 {}] 任务执行失败: {}", job_index, e);
                    stats.failed += 1;
                }
            }
        }

        logging::print_final_stats(&stats, self.config.output_log_file.as_deref());
        stats
    }

    /// 停止清理器并关闭由本进程启动的浏览器
    pub async fn stop(&self) {
        if let Some(task) = self.janitor_task.lock().take() {
            task.abort();
        }
        let remaining = self.janitor.window_count();
        if remaining > 0 {
            warn!("停止时仍有 {} 个窗口未关闭", remaining);
        }
        if let Some(chromium) = &self.chromium {
            chromium.shutdown().await;
        }
        info!("导出器已停止");
    }
}

impl Drop for Exporter {
    fn drop(&mut self) {
        if let Some(task) = self.janitor_task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::{MockBehaviour, MockEngine};
    use std::time::Duration;

    fn exporter_with(behaviour: MockBehaviour, config: Config) -> (Arc<MockEngine>, Arc<Exporter>) {
        let bus = SignalBus::new();
        let engine = Arc::new(MockEngine::with_behaviour(bus.clone(), behaviour));
        let exporter = Exporter::with_engine(config, engine.clone(), bus);
        (engine, Arc::new(exporter))
    }

    fn manifest(inputs: &[&str], output: PathBuf) -> JobManifest {
        JobManifest {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            output: output.display().to_string(),
            config: RenderConfig::default(),
            orientations: None,
            close_window: true,
            file_path: None,
        }
    }

    #[tokio::test]
    async fn create_job_rejects_empty_inputs() {
        let (_engine, exporter) = exporter_with(MockBehaviour::default(), Config::default());
        let err = exporter
            .create_job(&[], "out.pdf", RenderConfig::default(), JobOptions::default())
            .await
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn create_job_resolves_local_files_and_default_lifespan() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("a.html");
        std::fs::write(&page, "<p>a</p>").unwrap();
        let config = Config {
            window_life_threshold: Duration::from_secs(42),
            ..Default::default()
        };
        let (_engine, exporter) = exporter_with(MockBehaviour::default(), config);

        let job = exporter
            .create_job(
                &[page.display().to_string()],
                dir.path().join("a.pdf"),
                RenderConfig::default(),
                JobOptions::default(),
            )
            .await
            .unwrap();
        assert!(job.resources()[0].starts_with("file://"));
        assert_eq!(job.window_lifespan(), Duration::from_secs(42));
    }

    #[tokio::test]
    async fn explicit_lifespan_is_kept_even_when_equal_to_default() {
        let config = Config {
            window_life_threshold: Duration::from_secs(42),
            ..Default::default()
        };
        let (_engine, exporter) = exporter_with(MockBehaviour::default(), config);

        let job = exporter
            .create_job(
                &["https://example.com/".to_string()],
                "out.pdf",
                RenderConfig::default(),
                JobOptions {
                    window_lifespan: Some(crate::orchestrator::export_job::DEFAULT_WINDOW_LIFESPAN),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(job.window_lifespan(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn run_all_limits_concurrency_and_counts_results() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            max_concurrent_jobs: 2,
            resilient: true,
            ..Default::default()
        };
        let (engine, exporter) = exporter_with(MockBehaviour::default(), config);

        let manifests = (1..=3)
            .map(|i| manifest(&["https://example.com/"], dir.path().join(format!("{}.pdf", i))))
            .collect();
        let stats = exporter.run_all(manifests).await;

        assert_eq!(
            stats,
            BatchStats {
                total: 3,
                success: 3,
                failed: 0,
                skipped: 0
            }
        );
        assert_eq!(engine.open_count(), 3);
        assert_eq!(exporter.janitor().window_count(), 0);
    }

    #[tokio::test]
    async fn non_resilient_batch_stops_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            max_concurrent_jobs: 1,
            resilient: false,
            ..Default::default()
        };
        let (_engine, exporter) = exporter_with(
            MockBehaviour {
                fail_pdf: true,
                ..Default::default()
            },
            config,
        );

        let manifests = (1..=3)
            .map(|i| manifest(&["https://example.com/"], dir.path().join(format!("{}.pdf", i))))
            .collect();
        let stats = exporter.run_all(manifests).await;

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 2);
    }

    #[tokio::test]
    async fn stop_aborts_janitor() {
        let (_engine, exporter) = exporter_with(MockBehaviour::default(), Config::default());
        exporter.stop().await;
        assert!(exporter.janitor_task.lock().is_none());
    }
}
