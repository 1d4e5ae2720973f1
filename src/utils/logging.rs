/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::fs;

use tracing::{error, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::JobReport;
use crate::orchestrator::BatchStats;

/// 初始化日志文件，写入带时间戳的文件头
pub fn init_log_file(log_file_path: &str) -> AppResult<()> {
    let log_header = format!(
        "{}\n导出日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header).map_err(|e| AppError::file_write_failed(log_file_path, e))
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 导出器启动");
    match config.browser_debug_port {
        Some(port) => info!("🔌 连接已有浏览器 (端口 {})", port),
        None => info!("🧭 启动浏览器 (无头: {})", config.headless),
    }
    info!("📊 最大并发数: {}", config.max_concurrent_jobs);
    info!("⏱️ 窗口寿命: {:?}", config.window_life_threshold);
    info!("{}", "=".repeat(60));
}

/// 记录清单加载信息
pub fn log_jobs_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 个任务清单", total);
    info!("📋 最多同时运行 {} 个任务", max_concurrent);
}

/// 记录单个任务的结果
pub fn log_job_report(job_index: usize, name: &str, report: &JobReport) {
    info!("\n{}", "─".repeat(60));
    info!(
        "[清单 {}] {} 完成: 成功 {}/{}",
        job_index,
        name,
        report.succeeded(),
        report.results.len()
    );
    for result in &report.results {
        match (&result.target_file, &result.error) {
            (_, Some(e)) => error!("  #{} ❌ {}", result.source_index + 1, truncate_text(&e.to_string(), 200)),
            (Some(file), None) => info!("  #{} ✓ {}", result.source_index + 1, file.display()),
            (None, None) => info!("  #{} ✓ (内存)", result.source_index + 1),
        }
    }
    if let Some(e) = &report.error {
        error!("  任务错误: {}", e);
    }
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(stats: &BatchStats, log_file_path: Option<&str>) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", stats.success, stats.total);
    info!("❌ 失败: {}", stats.failed);
    if stats.skipped > 0 {
        info!("⏭️ 未启动: {}", stats.skipped);
    }
    info!("{}", "=".repeat(60));
    if let Some(path) = log_file_path {
        info!("\n日志已保存至: {}", path);
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
