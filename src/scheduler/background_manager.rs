// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use metrics::{counter, gauge, histogram};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::settings::{ConcurrencySettings, SchedulerSettings};
use crate::domain::models::provider::derive_provider;
use crate::domain::models::task::{AgentArgs, Task, TaskStatus};
use crate::executors::traits::{AgentExecutor, AgentOutcome};
use crate::scheduler::concurrency::{ConcurrencyManager, ConcurrencySnapshot};
use crate::scheduler::task_queue::{QueueStats, TaskQueue};
use crate::utils::errors::SchedulerError;

/// 任务入队回执
#[derive(Debug, Clone, Serialize)]
pub struct LaunchReceipt {
    /// 新任务的ID
    pub task_id: String,
    /// 人类可读的回执消息
    pub message: String,
}

/// 任务查询报告
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    /// 人类可读的状态消息
    pub message: String,
    /// 任务快照，任务不存在时为空
    pub task: Option<Task>,
}

/// 调度器统计信息
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    /// 人类可读的汇总消息
    pub message: String,
    /// 队列统计
    pub queue: QueueStats,
    /// 并发状态快照
    pub concurrency: ConcurrencySnapshot,
}

/// 后台管理器
///
/// 调度层的门面：持有任务队列和并发管理器，运行单飞的排水循环，
/// 对外提供launch/poll/cancel/stats接口。所有共享状态都由本结构
/// 独占持有，外部只能通过这些接口访问。
///
/// 排水循环由每次launch和每次任务结束通过Notify唤醒，无需外部
/// 定时器；晋升按到达顺序公平扫描，取第一个有并发额度的等待
/// 任务，被额度卡住的队首不会阻塞其后的任务。
pub struct BackgroundManager {
    queue: RwLock<TaskQueue>,
    concurrency: RwLock<ConcurrencyManager>,
    executor: Arc<dyn AgentExecutor>,
    settings: SchedulerSettings,
    handles: DashMap<String, JoinHandle<()>>,
    drain_notify: Notify,
}

impl BackgroundManager {
    /// 创建新的后台管理器实例
    ///
    /// # 参数
    ///
    /// * `executor` - 代理执行器
    /// * `scheduler` - 调度器配置
    /// * `concurrency` - 并发配置
    ///
    /// # 返回值
    ///
    /// 返回Arc包装的管理器，可在处理器和后台任务间共享
    pub fn new(
        executor: Arc<dyn AgentExecutor>,
        scheduler: SchedulerSettings,
        concurrency: &ConcurrencySettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue: RwLock::new(TaskQueue::new(scheduler.max_queue_size)),
            concurrency: RwLock::new(ConcurrencyManager::new(concurrency)),
            executor,
            settings: scheduler,
            handles: DashMap::new(),
            drain_notify: Notify::new(),
        })
    }

    /// 启动排水循环
    ///
    /// # 返回值
    ///
    /// 返回后台任务的句柄
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            info!("Background drain loop started");
            loop {
                manager.drain_notify.notified().await;
                manager.drain();
            }
        })
    }

    /// 提交任务
    ///
    /// 解析模型与服务商，构造任务并入队，唤醒排水循环后立即返回。
    /// 不等待执行器，返回耗时与执行器快慢无关。
    ///
    /// # 参数
    ///
    /// * `args` - 代理调用参数
    ///
    /// # 返回值
    ///
    /// * `Ok(LaunchReceipt)` - 新任务ID和回执消息
    /// * `Err(SchedulerError::QueueOverflow)` - 队列已满，任务未创建
    pub fn launch(&self, mut args: AgentArgs) -> Result<LaunchReceipt, SchedulerError> {
        let model = args
            .model
            .clone()
            .unwrap_or_else(|| self.settings.default_model.clone());
        args.model = Some(model.clone());
        let provider = derive_provider(&model).to_string();

        let task = Task::new(args, model, provider);
        let task_id = task.id.clone();
        let position = {
            let mut queue = self.queue.write();
            queue.enqueue(task)?;
            queue.position(&task_id).unwrap_or(1)
        };

        counter!("agent_tasks_total").increment(1);
        debug!("Task queued: {} (position {})", task_id, position);
        self.drain_notify.notify_one();

        Ok(LaunchReceipt {
            message: format!("Task queued: {} (position {} in queue)", task_id, position),
            task_id,
        })
    }

    /// 查询任务状态
    ///
    /// 终态任务可重复查询，无副作用。等待中的任务报告当前队列
    /// 位置（每次重新计算，不做存储）。
    pub fn poll(&self, id: &str) -> TaskReport {
        let queue = self.queue.read();
        match queue.get(id) {
            None => TaskReport {
                message: format!("Task {} not found", id),
                task: None,
            },
            Some(task) => {
                let message = match task.status {
                    TaskStatus::Pending => format!(
                        "Task {} is pending (position {} in queue)",
                        id,
                        queue.position(id).unwrap_or(0)
                    ),
                    TaskStatus::Running => format!(
                        "Task {} is running (started at {})",
                        id,
                        task.started_at.map(|t| t.to_rfc3339()).unwrap_or_default()
                    ),
                    TaskStatus::Completed => format!(
                        "Task {} completed in {}ms",
                        id,
                        task.duration_ms().unwrap_or(0)
                    ),
                    TaskStatus::Failed => format!(
                        "Task {} failed: {}",
                        id,
                        task.error.as_deref().unwrap_or("unknown error")
                    ),
                    TaskStatus::Cancelled => format!("Task {} was cancelled", id),
                };
                TaskReport {
                    message,
                    task: Some(task.clone()),
                }
            }
        }
    }

    /// 取消任务
    ///
    /// 等待中的任务直接标记取消，不会到达执行器；运行中的任务
    /// 标记取消、释放并发额度并中止其执行句柄。簿记立即生效，
    /// 远端调用是否真正停止只能尽力而为。终态任务原样返回。
    pub fn cancel(&self, id: &str) -> TaskReport {
        enum Outcome {
            NotFound,
            AlreadyTerminal(Task),
            Cancelled {
                released: Option<(String, String)>,
                snapshot: Task,
            },
        }

        let outcome = {
            let mut queue = self.queue.write();
            match queue.get_mut(id) {
                None => Outcome::NotFound,
                Some(task) if task.status.is_terminal() => Outcome::AlreadyTerminal(task.clone()),
                Some(task) => {
                    let was_running = task.status == TaskStatus::Running;
                    match task.cancel() {
                        Ok(()) => Outcome::Cancelled {
                            released: was_running
                                .then(|| (task.model.clone(), task.provider.clone())),
                            snapshot: task.clone(),
                        },
                        Err(e) => {
                            warn!("Failed to cancel task {}: {}", id, e);
                            Outcome::AlreadyTerminal(task.clone())
                        }
                    }
                }
            }
        };

        match outcome {
            Outcome::NotFound => TaskReport {
                message: format!("Task {} not found", id),
                task: None,
            },
            Outcome::Cancelled { released, snapshot } => {
                if let Some((model, provider)) = released {
                    self.concurrency.write().release(&model, &provider);
                    gauge!("agent_tasks_running").decrement(1.0);
                    if let Some((_, handle)) = self.handles.remove(id) {
                        handle.abort();
                    }
                    self.drain_notify.notify_one();
                }
                counter!("agent_tasks_cancelled_total").increment(1);
                info!("Task {} cancelled", id);
                TaskReport {
                    message: format!("Task {} cancelled", id),
                    task: Some(snapshot),
                }
            }
            Outcome::AlreadyTerminal(snapshot) => TaskReport {
                message: format!("Task {} already {}", id, snapshot.status),
                task: Some(snapshot),
            },
        }
    }

    /// 获取调度器统计信息
    ///
    /// 永不失败；尚无任务时返回全零计数
    pub fn stats(&self) -> SchedulerStats {
        let queue = self.queue.read().stats();
        let concurrency = self.concurrency.read().status();
        let message = format!(
            "{} tasks total: {} pending, {} running, {} completed, {} failed, {} cancelled",
            queue.total,
            queue.pending,
            queue.running,
            queue.completed,
            queue.failed,
            queue.cancelled
        );
        SchedulerStats {
            message,
            queue,
            concurrency,
        }
    }

    /// 清理过期的终态任务
    ///
    /// 由清扫器周期调用
    ///
    /// # 返回值
    ///
    /// 返回清理的任务数
    pub fn cleanup_stale(&self) -> usize {
        let retention = ChronoDuration::seconds(self.settings.stale_retention_secs as i64);
        self.queue.write().cleanup(retention, Utc::now())
    }

    /// 直接注入任务记录，供测试构造历史状态
    #[cfg(test)]
    pub(crate) fn inject_task(&self, task: Task) {
        self.queue
            .write()
            .enqueue(task)
            .expect("test queue should not overflow");
    }

    /// 排空可晋升的等待任务
    ///
    /// 循环晋升直到没有既等待又有额度的任务为止。晋升中的意外
    /// 错误只记录日志，单个坏任务不会卡死循环。
    fn drain(self: &Arc<Self>) {
        while let Some((id, args, model, provider)) = self.promote_next() {
            self.dispatch(id, args, model, provider);
        }
    }

    /// 晋升下一个可运行任务
    ///
    /// 额度检查、状态迁移和acquire在同一个写锁临界区内完成，
    /// 锁顺序恒为先队列后并发，两处不变式由此保证。
    fn promote_next(&self) -> Option<(String, AgentArgs, String, String)> {
        let mut queue = self.queue.write();
        let mut concurrency = self.concurrency.write();
        let task = queue.next_runnable_mut(|m, p| concurrency.can_run(m, p))?;
        if let Err(e) = task.start() {
            warn!("Failed to promote task {}: {}", task.id, e);
            return None;
        }
        concurrency.acquire(&task.model, &task.provider);
        Some((
            task.id.clone(),
            task.args.clone(),
            task.model.clone(),
            task.provider.clone(),
        ))
    }

    /// 分发任务到执行器
    ///
    /// 任务在独立的tokio任务上执行并套上单任务超时，排水循环
    /// 不等待其完成，多个任务真正并发执行。
    fn dispatch(self: &Arc<Self>, id: String, args: AgentArgs, model: String, provider: String) {
        gauge!("agent_tasks_running").increment(1.0);
        info!(
            "Dispatching task {} (model {}, provider {})",
            id, model, provider
        );

        let manager = Arc::clone(self);
        let timeout_ms = self.settings.task_timeout_ms;
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            let result = timeout(
                Duration::from_millis(timeout_ms),
                manager.executor.execute(&args),
            )
            .await;
            let outcome = match result {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(err)) => Err(SchedulerError::AgentExecution(err.to_string())),
                Err(_) => {
                    warn!("Task {} exceeded timeout: {}ms", task_id, timeout_ms);
                    Err(SchedulerError::TaskTimeout { timeout_ms })
                }
            };
            manager.settle(&task_id, outcome);
        });

        self.handles.insert(id.clone(), handle);
        // Settle may have raced the insert; drop the handle if already terminal.
        let terminal = self
            .queue
            .read()
            .get(&id)
            .map(|t| t.status.is_terminal())
            .unwrap_or(false);
        if terminal {
            self.handles.remove(&id);
        }
    }

    /// 结算任务
    ///
    /// 仅当任务仍处于运行态时写入终态字段并释放额度；已被取消的
    /// 任务在这里不做任何事（取消路径已完成释放）。结算后重新
    /// 唤醒排水循环，让空出的额度去晋升其他等待任务。
    fn settle(&self, id: &str, outcome: Result<AgentOutcome, SchedulerError>) {
        let released = {
            let mut queue = self.queue.write();
            match queue.get_mut(id) {
                Some(task) if task.status == TaskStatus::Running => {
                    match outcome {
                        Ok(result) => match task.complete(result) {
                            Ok(()) => {
                                counter!("agent_tasks_completed_total").increment(1);
                                if let Some(ms) = task.duration_ms() {
                                    histogram!("agent_task_duration_seconds")
                                        .record(ms as f64 / 1000.0);
                                }
                                info!("Task {} completed", id);
                            }
                            Err(e) => warn!("Failed to complete task {}: {}", id, e),
                        },
                        Err(err) => {
                            let text = err.to_string();
                            match task.fail(text.clone()) {
                                Ok(()) => {
                                    counter!("agent_tasks_failed_total").increment(1);
                                    warn!("Task {} failed: {}", id, text);
                                }
                                Err(e) => warn!("Failed to mark task {} failed: {}", id, e),
                            }
                        }
                    }
                    Some((task.model.clone(), task.provider.clone()))
                }
                _ => None,
            }
        };

        if let Some((model, provider)) = released {
            self.concurrency.write().release(&model, &provider);
            gauge!("agent_tasks_running").decrement(1.0);
        }
        self.handles.remove(id);
        self.drain_notify.notify_one();
    }
}
