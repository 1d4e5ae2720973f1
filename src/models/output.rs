use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 输出类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// 分页文档
    Pdf,
    /// 位图截图
    Png,
    /// 原始页面标记
    Html,
}

impl OutputKind {
    /// 对应的文件扩展名（不含点）
    pub fn extension(self) -> &'static str {
        match self {
            OutputKind::Pdf => "pdf",
            OutputKind::Png => "png",
            OutputKind::Html => "html",
        }
    }

    /// 由目标文件扩展名推断；无法识别时按 PDF 处理
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("png") => OutputKind::Png,
            Some("html") | Some("htm") => OutputKind::Html,
            _ => OutputKind::Pdf,
        }
    }

    /// 显式类型优先，其次按扩展名推断
    pub fn resolve(explicit: Option<OutputKind>, target: &Path) -> Self {
        explicit.unwrap_or_else(|| Self::from_path(target))
    }
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// 单个资源的捕获结果
#[derive(Debug, Clone)]
pub struct CaptureResult {
    /// 资源在输入列表中的位置（从 0 开始）
    pub source_index: usize,
    /// 写入的文件（文件模式）
    pub target_file: Option<PathBuf>,
    /// 输出内容（内存模式）
    pub data: Option<Arc<[u8]>>,
    pub error: Option<AppError>,
}

impl CaptureResult {
    pub fn written(source_index: usize, target_file: PathBuf) -> Self {
        Self {
            source_index,
            target_file: Some(target_file),
            data: None,
            error: None,
        }
    }

    pub fn in_memory(source_index: usize, data: Arc<[u8]>) -> Self {
        Self {
            source_index,
            target_file: None,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(source_index: usize, target_file: Option<PathBuf>, error: AppError) -> Self {
        Self {
            source_index,
            target_file,
            data: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 任务汇总结果
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: String,
    /// 按输入顺序排列；失败前已完成的结果会保留
    pub results: Vec<CaptureResult>,
    /// 遇到的第一个错误
    pub error: Option<AppError>,
}

impl JobReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_extension_unless_overridden() {
        assert_eq!(OutputKind::from_path(Path::new("out.PNG")), OutputKind::Png);
        assert_eq!(OutputKind::from_path(Path::new("page.htm")), OutputKind::Html);
        assert_eq!(OutputKind::from_path(Path::new("out")), OutputKind::Pdf);
        assert_eq!(
            OutputKind::resolve(Some(OutputKind::Html), Path::new("out.pdf")),
            OutputKind::Html
        );
    }
}
