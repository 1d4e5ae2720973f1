use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::models::page_size::Orientation;
use crate::models::render_config::RenderConfig;

/// 任务清单：一个 TOML 文件描述一次导出
///
/// ```toml
/// inputs = ["report.md", "https://example.com/summary"]
/// output = "out/report.pdf"
/// orientations = ["portrait", "landscape"]
///
/// [config]
/// pageSize = "Letter"
/// waitForJsEvent = "ready"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobManifest {
    pub inputs: Vec<String>,
    pub output: String,
    #[serde(default)]
    pub config: RenderConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientations: Option<Vec<Orientation>>,
    #[serde(default = "default_close_window")]
    pub close_window: bool,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<PathBuf>,
}

fn default_close_window() -> bool {
    true
}

impl JobManifest {
    /// 用于日志显示的名称
    pub fn display_name(&self) -> String {
        self.file_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.output.clone())
    }
}
