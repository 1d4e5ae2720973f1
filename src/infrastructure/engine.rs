//! 渲染引擎能力接口
//!
//! 编排层只通过这两个 trait 接触渲染引擎；引擎本身（布局、脚本、PDF/PNG 编码）是黑盒。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::AppResult;
use crate::models::{Dimensions, PageSize};

/// 打开窗口时使用的参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    /// 是否显示窗口
    pub show: bool,
    /// 独立的 cookie/存储分区；提供 cookie 时必须设置
    pub partition: Option<String>,
}

/// 单个 cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSpec {
    pub url: String,
    pub name: String,
    pub value: String,
}

/// 文档（PDF）捕获参数，原样交给引擎
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub margins_type: u8,
    pub print_background: bool,
    pub print_selection_only: bool,
    pub page_size: PageSize,
    pub landscape: bool,
}

/// 捕获请求
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureRequest {
    /// 分页文档
    Document(PdfOptions),
    /// 当前视口的位图
    Image,
}

impl CaptureRequest {
    pub fn kind_name(&self) -> &'static str {
        match self {
            CaptureRequest::Document(_) => "pdf",
            CaptureRequest::Image => "png",
        }
    }
}

/// 渲染引擎：负责创建窗口
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// 创建一个新窗口（独立的渲染上下文）
    async fn open(&self, config: &WindowConfig) -> AppResult<Arc<dyn RenderWindow>>;
}

/// 渲染窗口：一个外部渲染上下文
///
/// 每个调用都可能无限期挂起，调用方负责用超时保护。
#[async_trait]
pub trait RenderWindow: Send + Sync {
    /// 窗口标识
    fn id(&self) -> &str;

    /// 当前像素尺寸
    fn dimensions(&self) -> Dimensions;

    /// 是否已被销毁
    fn is_destroyed(&self) -> bool;

    /// 直接调整尺寸（不做相等判断，见 [`super::RendererSession::resize`]）
    async fn set_size(&self, dimensions: Dimensions) -> AppResult<()>;

    async fn set_cookies(&self, cookies: &[CookieSpec]) -> AppResult<()>;

    /// 加载资源；`headers` 附加到请求上
    async fn load(&self, url: &str, headers: &[(String, String)]) -> AppResult<()>;

    /// 在页面中执行脚本并返回结果
    async fn execute_script(&self, source: &str) -> AppResult<JsonValue>;

    /// 捕获输出字节
    async fn capture(&self, request: &CaptureRequest) -> AppResult<Vec<u8>>;

    /// 关闭窗口；重复调用无副作用
    async fn close(&self) -> AppResult<()>;
}
