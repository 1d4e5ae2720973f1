//! 窗口清理器 - 编排层
//!
//! 记录所有打开的窗口。任务异常退出而没有关闭窗口时，
//! 清理器会在窗口闲置超过寿命后强制回收它。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// 可被清理器回收的窗口持有者（即任务）
#[async_trait]
pub trait Reapable: Send + Sync {
    /// 窗口是否已被销毁
    fn is_window_destroyed(&self) -> bool;

    /// 发出 `window.termination` 事件
    fn emit_termination(&self, window_id: &str, lifespan: Duration);

    /// 释放窗口
    async fn destroy(&self);
}

struct WindowEntry {
    owner: Arc<dyn Reapable>,
    last_touched: Instant,
    lifespan: Duration,
}

/// 窗口清理器
///
/// 克隆只复制句柄，所有克隆共享同一份登记表。
#[derive(Clone, Default)]
pub struct WindowJanitor {
    windows: Arc<DashMap<String, WindowEntry>>,
}

impl WindowJanitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新打开的窗口
    pub fn register(&self, window_id: &str, owner: Arc<dyn Reapable>, lifespan: Duration) {
        self.windows.insert(
            window_id.to_string(),
            WindowEntry {
                owner,
                last_touched: Instant::now(),
                lifespan,
            },
        );
    }

    /// 刷新窗口的最近使用时间
    pub fn touch(&self, window_id: &str) {
        match self.windows.get_mut(window_id) {
            Some(mut entry) => entry.last_touched = Instant::now(),
            None => debug!("窗口 {} 未登记，忽略 touch", window_id),
        }
    }

    /// 任务正常关闭窗口时注销
    pub fn remove(&self, window_id: &str) {
        self.windows.remove(window_id);
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// 回收所有闲置时间达到寿命的窗口，返回处理的条目数
    ///
    /// `threshold` 覆盖各窗口登记时的寿命。
    pub async fn cleanup_hung_windows(&self, threshold: Option<Duration>) -> usize {
        let now = Instant::now();
        let hung: Vec<(String, Arc<dyn Reapable>, Duration)> = self
            .windows
            .iter()
            .filter_map(|entry| {
                let idle = now.saturating_duration_since(entry.last_touched);
                let limit = threshold.unwrap_or(entry.lifespan);
                (idle >= limit).then(|| (entry.key().clone(), Arc::clone(&entry.owner), idle))
            })
            .collect();

        debug!(
            "检查闲置窗口 -> 窗口总数: {}, 闲置窗口: {}",
            self.windows.len(),
            hung.len()
        );

        for (window_id, owner, idle) in &hung {
            if owner.is_window_destroyed() {
                warn!("窗口 {} 已被销毁但仍在登记表中，直接移除", window_id);
                self.windows.remove(window_id);
                continue;
            }

            warn!("🧹 回收闲置 {:?} 的窗口 {}", idle, window_id);
            owner.emit_termination(window_id, *idle);
            self.windows.remove(window_id);
            owner.destroy().await;
        }

        hung.len()
    }

    /// 启动后台扫描任务
    pub fn spawn(&self, interval: Duration) -> JoinHandle<()> {
        let janitor = self.clone();
        info!("窗口清理器已启动 (间隔 {:?})", interval);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 第一次 tick 立即完成
            ticker.tick().await;
            loop {
                ticker.tick().await;
                janitor.cleanup_hung_windows(None).await;
            }
        })
    }
}
