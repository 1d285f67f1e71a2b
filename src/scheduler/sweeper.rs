use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::scheduler::background_manager::BackgroundManager;

/// 过期任务清扫器
///
/// 负责定期清除保留期已过的终态任务，限制内存增长。
/// 等待中和运行中的任务不在清扫范围内。
pub struct StaleTaskSweeper {
    manager: Arc<BackgroundManager>,
    interval: Duration,
}

impl StaleTaskSweeper {
    pub fn new(manager: Arc<BackgroundManager>, interval: Duration) -> Self {
        Self { manager, interval }
    }

    /// 运行清扫器
    pub async fn run(&self) {
        info!("Stale task sweeper started");

        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;

            let removed = self.sweep();
            if removed > 0 {
                info!("Swept {} stale tasks", removed);
            }
        }
    }

    /// 启动后台运行
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    fn sweep(&self) -> usize {
        self.manager.cleanup_stale()
    }
}

#[cfg(test)]
#[path = "sweeper_test.rs"]
mod tests;
