//! # HTML Export
//!
//! 通过 Chromium（DevTools 协议）把 HTML / Markdown 导出为 PDF、PNG 或 HTML
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（窗口），只暴露能力
//! - `RenderEngine` / `RenderWindow` - 渲染引擎能力接口，`ChromiumEngine` 为默认实现
//! - `RendererSession` - 任务独占的窗口句柄
//! - `SignalBus` - 页面信号（事件名 + 任务 ID + detail）的进程内通道
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个资源
//! - `geometry` - 纸张尺寸到窗口像素的换算
//! - `request` - cookie、请求头、窗口参数解析
//! - `readiness` - 固定延迟或页面事件等待
//! - `capture` - PDF / PNG / HTML 捕获与输出
//! - `source` / `markdown` - 输入解析与 Markdown 转换
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个资源"的完整处理流程
//! - `ResourceCtx` - 上下文封装（任务 ID + 资源序号）
//! - `ResourceFlow` - 流程编排（resize → load → ready → capture）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/exporter` - 导出器，管理进程级资源和批量并发
//! - `orchestrator/export_job` - 单个任务，串行处理资源列表
//! - `orchestrator/janitor` - 回收闲置窗口
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod events;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use events::{EventEmitter, JobEvent};
pub use infrastructure::{ChromiumEngine, RenderEngine, RendererSession, SignalBus};
pub use models::{CaptureResult, JobManifest, JobReport, OutputKind, RenderConfig};
pub use orchestrator::{ExportJob, Exporter, JobOptions, WindowJanitor};
