//! 输入源解析服务 - 业务能力层
//!
//! 把命令行或清单中的输入转换为渲染引擎可以加载的 URL：
//! - `.md` / `.markdown` 文件先转换为临时 HTML
//! - 本地路径转换为 `file://` URL
//! - 其他 URL 原样保留

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::error::{AppError, AppResult, SourceError};
use crate::services::markdown::MarkdownConverter;

/// 输入源解析器
#[derive(Default)]
pub struct SourceResolver {
    markdown: MarkdownConverter,
}

impl SourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按顺序解析所有输入
    pub async fn resolve(&self, inputs: &[String], custom_css: &[String]) -> AppResult<Vec<String>> {
        let mut resolved = Vec::with_capacity(inputs.len());
        for input in inputs {
            resolved.push(self.resolve_one(input, custom_css).await?);
        }
        Ok(resolved)
    }

    pub async fn resolve_one(&self, input: &str, custom_css: &[String]) -> AppResult<String> {
        if is_url(input) {
            return Ok(input.to_string());
        }

        let path = if is_markdown(input) {
            self.markdown.convert(Path::new(input), custom_css).await?
        } else {
            PathBuf::from(input)
        };
        let url = file_url(&path)?;
        debug!("输入 {} 解析为 {}", input, url);
        Ok(url)
    }
}

/// 是否为 Markdown 文件（按扩展名，不区分大小写）
pub fn is_markdown(input: &str) -> bool {
    Regex::new(r"(?i)\.(md|markdown)$")
        .map(|re| re.is_match(input))
        .unwrap_or(false)
}

/// 是否已经是带协议的 URL（Windows 盘符不算）
fn is_url(input: &str) -> bool {
    Url::parse(input)
        .map(|url| url.scheme().len() > 1)
        .unwrap_or(false)
}

fn file_url(path: &Path) -> AppResult<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| AppError::file_read_failed(".", e))?
            .join(path)
    };
    Url::from_file_path(&absolute)
        .map(|url| url.to_string())
        .map_err(|_| {
            AppError::Source(SourceError::InvalidInput {
                input: path.display().to_string(),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_detection_is_case_insensitive() {
        assert!(is_markdown("README.md"));
        assert!(is_markdown("docs/Guide.MARKDOWN"));
        assert!(!is_markdown("page.html"));
        assert!(!is_markdown("md"));
    }

    #[tokio::test]
    async fn urls_pass_through() {
        let resolver = SourceResolver::new();
        let url = resolver.resolve_one("https://example.com/a.md", &[]).await.unwrap();
        assert_eq!(url, "https://example.com/a.md");
    }

    #[tokio::test]
    async fn local_paths_become_file_urls() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("page.html");
        std::fs::write(&page, "<p>hi</p>").unwrap();

        let resolver = SourceResolver::new();
        let url = resolver
            .resolve_one(&page.display().to_string(), &[])
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/page.html"));
    }

    #[tokio::test]
    async fn markdown_is_converted_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("report.md");
        std::fs::write(&input, "# Report").unwrap();

        let resolver = SourceResolver::new();
        let resolved = resolver
            .resolve(&[input.display().to_string()], &["print.css".into()])
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].starts_with("file://"));
        assert!(resolved[0].ends_with(".html"));
        assert!(resolved[0].contains("report-"));
    }
}
