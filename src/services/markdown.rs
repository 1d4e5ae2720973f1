//! Markdown 转换服务 - 业务能力层
//!
//! 把 Markdown 文件渲染为临时 HTML 文件，返回该文件的路径

use std::path::{Path, PathBuf};

use comrak::options::Options;
use comrak::{format_html, parse_document, Arena};
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult, SourceError};

/// Markdown 转换器
pub struct MarkdownConverter {
    options: Options<'static>,
}

impl MarkdownConverter {
    pub fn new() -> Self {
        let mut options = Options::default();
        let ext = &mut options.extension;
        ext.strikethrough = true;
        ext.table = true;
        ext.autolink = true;
        ext.tasklist = true;
        ext.footnotes = true;
        Self { options }
    }

    /// 渲染为完整的 HTML 文档；`custom_css` 中的每一项生成一个 `<link>`
    pub fn render(&self, markdown: &str, custom_css: &[String]) -> Result<String, std::fmt::Error> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);
        let mut body = String::new();
        format_html(root, &self.options, &mut body)?;

        let links: String = custom_css
            .iter()
            .map(|href| format!("<link rel=\"stylesheet\" href=\"{}\">\n", escape_attribute(href)))
            .collect();

        Ok(format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n{}</head>\n<body>\n{}</body>\n</html>\n",
            links, body
        ))
    }

    /// 读取 Markdown 文件，写入系统临时目录下的 `<文件名>-<uuid>.html`
    pub async fn convert(&self, input: &Path, custom_css: &[String]) -> AppResult<PathBuf> {
        let markdown = tokio::fs::read_to_string(input)
            .await
            .map_err(|e| AppError::file_read_failed(input.display().to_string(), e))?;

        let html = self.render(&markdown, custom_css).map_err(|e| {
            AppError::Source(SourceError::MarkdownFailed {
                path: input.display().to_string(),
                reason: e.to_string(),
            })
        })?;

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "markdown".to_string());
        let output = std::env::temp_dir().join(format!("{}-{}.html", stem, Uuid::new_v4()));

        tokio::fs::write(&output, html)
            .await
            .map_err(|e| AppError::file_write_failed(output.display().to_string(), e))?;
        debug!("Markdown {} 已转换为 {}", input.display(), output.display());
        Ok(output)
    }
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
