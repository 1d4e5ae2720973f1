//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责任务生命周期和进程级资源，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `exporter` - 导出器
//! - 持有渲染引擎、信号总线和窗口清理器
//! - 解析输入源，创建任务
//! - 批量运行任务清单（Semaphore 控制并发）
//!
//! ### `export_job` - 单个导出任务
//! - 创建并复用一个窗口
//! - 依次处理所有资源，汇总结果
//! - 发出生命周期事件
//!
//! ### `janitor` - 窗口清理器
//! - 登记所有打开的窗口
//! - 定期回收闲置过久的窗口
//!
//! ## 层次关系
//!
//! ```text
//! exporter (处理 Vec<JobManifest>)
//!     ↓
//! export_job (处理 Vec<资源>)
//!     ↓
//! workflow::ResourceFlow (处理单个资源)
//!     ↓
//! services (能力层：geometry / request / readiness / capture)
//!     ↓
//! infrastructure (基础设施：RendererSession / RenderEngine)
//! ```

pub mod export_job;
pub mod exporter;
pub mod janitor;

pub use export_job::{ExportJob, JobContext, JobOptions};
pub use exporter::{BatchStats, Exporter};
pub use janitor::{Reapable, WindowJanitor};
