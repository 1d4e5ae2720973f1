//! 资源处理上下文
//!
//! 封装"我正在处理哪个任务的第几个资源"这一信息

use std::fmt::Display;
use std::path::PathBuf;

/// 资源处理上下文
#[derive(Debug, Clone)]
pub struct ResourceCtx {
    /// 任务ID
    pub job_id: String,

    /// 资源在输入列表中的位置（从 0 开始）
    pub index: usize,

    /// 资源总数
    pub total: usize,

    /// 要加载的 URL
    pub url: String,

    /// 任务的输出路径；多资源时由流程按序号派生实际文件名
    pub output: PathBuf,
}

impl ResourceCtx {
    pub fn new(job_id: String, index: usize, total: usize, url: String, output: PathBuf) -> Self {
        Self {
            job_id,
            index,
            total,
            url,
            output,
        }
    }
}

impl Display for ResourceCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[任务 {} 资源#{}/{}]",
            self.job_id,
            self.index + 1,
            self.total
        )
    }
}
