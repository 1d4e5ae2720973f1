use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use html_export::config::Config;
use html_export::logger;
use html_export::models::{load_all_manifests, load_render_config, OutputKind, Orientation, PageSize, RenderConfig};
use html_export::orchestrator::{Exporter, JobOptions};
use html_export::utils::logging;

/// 把 HTML / Markdown 导出为 PDF、PNG 或 HTML
#[derive(Parser, Debug)]
#[command(name = "html-export", version)]
struct Cli {
    /// 输入：URL、本地 HTML 文件或 Markdown 文件，按顺序渲染
    inputs: Vec<String>,

    /// 输出文件；多个输入时生成 <名称>_<n>.<扩展名>
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 批量模式：运行目录中的所有任务清单（*.toml）
    #[arg(long, conflicts_with_all = ["inputs", "output"])]
    manifests: Option<PathBuf>,

    /// 从 TOML 文件读取渲染配置，命令行参数覆盖其中的值
    #[arg(long, env = "HTML_EXPORT_CONFIG")]
    config: Option<PathBuf>,

    /// 纸张尺寸：A3、A4、A5、Letter、Legal、Tabloid，或 {"width":..,"height":..}（微米）
    #[arg(short, long)]
    page_size: Option<String>,

    /// 横向
    #[arg(short, long)]
    landscape: bool,

    /// 每个输入的方向，逗号分隔（portrait / landscape）
    #[arg(long, value_delimiter = ',', value_parser = parse_orientation)]
    orientations: Vec<Orientation>,

    /// 边距类型：0 默认，1 无边距，2 最小边距
    #[arg(short, long)]
    margins_type: Option<u8>,

    /// 不打印背景
    #[arg(long)]
    no_background: bool,

    /// 只打印选区
    #[arg(short = 's', long)]
    print_selection_only: bool,

    /// 加载后的等待时间（毫秒）；等待页面事件时作为超时
    #[arg(short = 'w', long)]
    output_wait: Option<u64>,

    /// 等待页面派发此事件后再捕获；不带值时为 view-ready
    #[arg(short = 'e', long, num_args = 0..=1, default_missing_value = "")]
    wait_for_js_event: Option<String>,

    /// cookie，格式 name=value;name2=value2
    #[arg(long)]
    cookies: Option<String>,

    /// Accept-Language 请求头
    #[arg(long)]
    accept_language: Option<String>,

    /// 禁用缓存
    #[arg(short, long)]
    disable_cache: bool,

    /// 附加请求头（JSON 对象）
    #[arg(long)]
    request_headers: Option<String>,

    /// 窗口参数覆盖（JSON 对象，支持 width、height、show）
    #[arg(long)]
    browser_config: Option<String>,

    /// Markdown 输入使用的样式表，可重复
    #[arg(short, long)]
    css: Vec<String>,

    /// 输出类型，优先于输出文件扩展名
    #[arg(long = "type", value_parser = parse_output_kind)]
    output_type: Option<OutputKind>,

    /// 连接已有浏览器的调试端口
    #[arg(long)]
    debug_port: Option<u16>,

    /// 显示浏览器窗口
    #[arg(long)]
    headful: bool,
}

fn parse_orientation(value: &str) -> Result<Orientation, String> {
    Orientation::from_str(value).ok_or_else(|| format!("无效的方向: {}", value))
}

fn parse_output_kind(value: &str) -> Result<OutputKind, String> {
    match value.to_ascii_lowercase().as_str() {
        "pdf" => Ok(OutputKind::Pdf),
        "png" => Ok(OutputKind::Png),
        "html" => Ok(OutputKind::Html),
        other => Err(format!("无效的输出类型: {}", other)),
    }
}

fn parse_page_size(value: &str) -> Result<PageSize> {
    if value.trim_start().starts_with('{') {
        serde_json::from_str(value).with_context(|| format!("无效的纸张尺寸: {}", value))
    } else {
        Ok(PageSize::Named(value.to_string()))
    }
}

/// 合并配置文件和命令行参数
async fn build_render_config(cli: &Cli) -> Result<RenderConfig> {
    let mut config = match &cli.config {
        Some(path) => load_render_config(path).await?,
        None => RenderConfig::default(),
    };

    if let Some(page_size) = &cli.page_size {
        config.page_size = parse_page_size(page_size)?;
    }
    if cli.landscape {
        config.landscape = true;
    }
    if let Some(margins_type) = cli.margins_type {
        config.margins_type = margins_type;
    }
    if cli.no_background {
        config.print_background = false;
    }
    if cli.print_selection_only {
        config.print_selection_only = true;
    }
    if let Some(wait) = cli.output_wait {
        config.output_wait = wait;
    }
    if cli.wait_for_js_event.is_some() {
        config.wait_for_js_event = cli.wait_for_js_event.clone();
    }
    if cli.cookies.is_some() {
        config.cookies = cli.cookies.clone();
    }
    if cli.accept_language.is_some() {
        config.accept_language = cli.accept_language.clone();
    }
    if cli.disable_cache {
        config.disable_cache = true;
    }
    if cli.request_headers.is_some() {
        config.request_headers = cli.request_headers.clone();
    }
    if cli.browser_config.is_some() {
        config.browser_config = cli.browser_config.clone();
    }
    if !cli.css.is_empty() {
        config.css = cli.css.clone();
    }
    if cli.output_type.is_some() {
        config.output_type = cli.output_type;
    }
    Ok(config)
}

async fn run(cli: &Cli, exporter: &Arc<Exporter>) -> Result<()> {
    if let Some(dir) = &cli.manifests {
        let manifests = load_all_manifests(dir).await?;
        let stats = exporter.run_all(manifests).await;
        if stats.failed > 0 && !exporter.config().resilient {
            bail!("{} 个任务失败", stats.failed);
        }
        return Ok(());
    }

    if cli.inputs.is_empty() {
        bail!("没有输入；请提供至少一个 URL 或文件，或使用 --manifests");
    }
    let output = cli.output.clone().context("缺少输出文件 (-o/--output)")?;
    let render_config = build_render_config(cli).await?;

    let options = JobOptions {
        orientations: (!cli.orientations.is_empty()).then(|| cli.orientations.clone()),
        ..Default::default()
    };
    let job = exporter
        .create_job(&cli.inputs, &output, render_config, options)
        .await?;
    info!("任务 {} 已创建: {} 个资源 -> {}", job.id(), job.resources().len(), output.display());

    let report = job.run().await;
    logging::log_job_report(1, &output.display().to_string(), &report);
    if let Some(e) = report.error {
        if exporter.config().resilient {
            warn!("弹性模式：忽略任务错误 {}", e);
        } else {
            return Err(e.into());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = Config::from_env();
    if cli.debug_port.is_some() {
        config.browser_debug_port = cli.debug_port;
    }
    if cli.headful {
        config.headless = false;
    }

    // 初始化日志
    if let Some(path) = &config.output_log_file {
        logging::init_log_file(path)?;
    }
    logger::init_with_file(config.output_log_file.as_deref().map(Path::new));

    let exporter = Arc::new(Exporter::start(config).await?);
    let outcome = run(&cli, &exporter).await;
    exporter.stop().await;

    outcome
}
