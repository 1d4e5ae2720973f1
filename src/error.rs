use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
///
/// 所有变体都可以 `Clone`，因为错误会随 `job-complete` 事件广播给多个订阅者。
#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// 配置错误（对所属任务是致命的）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 浏览器（渲染引擎）相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 截取输出失败
    #[error("捕获错误: {0}")]
    Capture(#[from] CaptureError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 输入源解析错误（Markdown 转换等）
    #[error("输入源错误: {0}")]
    Source(#[from] SourceError),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 配置错误
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// 未知的纸张尺寸
    #[error("未知的纸张尺寸: {name}（可选: {known}）")]
    UnknownPageSize { name: String, known: String },
    /// 配置字段中的 JSON 格式错误
    #[error("字段 {field} 的 JSON 无效: {reason}")]
    InvalidJson { field: String, reason: String },
    /// 配置键不存在或值类型不匹配
    #[error("无法设置配置项 {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 没有可渲染的输入
    #[error("任务没有任何输入资源")]
    NoResources,
}

/// 浏览器相关错误
#[derive(Debug, Clone, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("启动浏览器失败: {reason}")]
    LaunchFailed { reason: String },
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {reason}")]
    ConnectionFailed { port: u16, reason: String },
    /// 创建窗口失败
    #[error("创建窗口失败: {reason}")]
    WindowOpenFailed { reason: String },
    /// 导航失败
    #[error("导航到 {url} 失败: {reason}")]
    NavigationFailed { url: String, reason: String },
    /// 执行脚本失败
    #[error("执行脚本失败: {reason}")]
    ScriptExecutionFailed { reason: String },
    /// 引擎调用超时
    #[error("{operation} 超过 {timeout:?} 未完成")]
    Timeout { operation: String, timeout: Duration },
    /// 窗口已被销毁
    #[error("窗口 {window_id} 已被销毁")]
    WindowDestroyed { window_id: String },
    /// 其他协议层错误
    #[error("浏览器协议错误: {reason}")]
    Protocol { reason: String },
}

/// 捕获错误
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// 渲染引擎编码输出失败
    #[error("引擎生成 {kind} 失败: {reason}")]
    EngineFailed { kind: String, reason: String },
    /// 渲染引擎返回了无法识别的内容
    #[error("引擎返回的 {kind} 内容无效")]
    InvalidOutput { kind: String },
}

/// 文件操作错误
#[derive(Debug, Clone, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: Arc<std::io::Error>,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: Arc<std::io::Error>,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {reason}")]
    TomlParseFailed { path: String, reason: String },
}

/// 输入源错误
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Markdown 转换失败
    #[error("Markdown 转换失败 ({path}): {reason}")]
    MarkdownFailed { path: String, reason: String },
    /// 无法将输入解析为 URL
    #[error("无法解析输入: {input}")]
    InvalidInput { input: String },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::Protocol {
            reason: err.to_string(),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(ConfigError::InvalidJson {
            field: String::new(),
            reason: err.to_string(),
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            reason: err.to_string(),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Arc::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(port: u16, reason: impl std::fmt::Display) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed {
            port,
            reason: reason.to_string(),
        })
    }

    /// 创建导航失败错误
    pub fn navigation_failed(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        AppError::Browser(BrowserError::NavigationFailed {
            url: url.into(),
            reason: reason.to_string(),
        })
    }

    /// 创建脚本执行错误
    pub fn script_failed(reason: impl std::fmt::Display) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            reason: reason.to_string(),
        })
    }

    /// 创建引擎调用超时错误
    pub fn timed_out(operation: impl Into<String>, timeout: Duration) -> Self {
        AppError::Browser(BrowserError::Timeout {
            operation: operation.into(),
            timeout,
        })
    }

    /// 创建引擎捕获错误
    pub fn capture_failed(kind: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        AppError::Capture(CaptureError::EngineFailed {
            kind: kind.into(),
            reason: reason.to_string(),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Arc::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Arc::new(source),
        })
    }

    /// 创建字段 JSON 无效错误
    pub fn invalid_json(field: impl Into<String>, err: serde_json::Error) -> Self {
        AppError::Config(ConfigError::InvalidJson {
            field: field.into(),
            reason: err.to_string(),
        })
    }

    /// 创建未知纸张尺寸错误，附带所有受支持的名称
    pub fn unknown_page_size(name: impl Into<String>) -> Self {
        let mut known: Vec<&str> = crate::models::PageSize::known_names().collect();
        known.sort_unstable();
        AppError::Config(ConfigError::UnknownPageSize {
            name: name.into(),
            known: known.join(", "),
        })
    }

    /// 是否为配置类（致命）错误
    pub fn is_configuration(&self) -> bool {
        matches!(self, AppError::Config(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_flagged_as_configuration() {
        let err = AppError::unknown_page_size("B9");
        assert!(err.is_configuration());
        let message = err.to_string();
        assert!(message.contains("B9"));
        assert!(message.contains("A3, A4, A5, Legal, Letter, Tabloid"));
    }

    #[test]
    fn write_failure_keeps_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = AppError::file_write_failed("/tmp/out.pdf", io);
        let source = std::error::Error::source(&err).expect("file error source");
        assert!(std::error::Error::source(source).is_some());
        assert!(!err.is_configuration());
    }
}
