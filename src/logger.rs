//! 日志初始化

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// 初始化控制台日志；级别由 `RUST_LOG` 控制，默认 `info`
pub fn init() {
    init_with_file(None);
}

/// 初始化日志，并可选地追加写入日志文件（不带颜色）
///
/// 重复调用无副作用。
pub fn init_with_file(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = log_file
        .and_then(|path| match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("无法打开日志文件 {}: {}", path.display(), e);
                None
            }
        })
        .map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init();
}
