// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::domain::models::task::{Task, TaskStatus};
use crate::utils::errors::SchedulerError;

/// 队列统计信息
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    /// 队列中的任务总数（含终态）
    pub total: usize,
    /// 等待中任务数
    pub pending: usize,
    /// 运行中任务数
    pub running: usize,
    /// 已完成任务数
    pub completed: usize,
    /// 已失败任务数
    pub failed: usize,
    /// 已取消任务数
    pub cancelled: usize,
    /// 当前队列长度（等待中任务数）
    pub queue_size: usize,
    /// 队列长度上限
    pub max_queue_size: usize,
}

/// 内存任务队列
///
/// 按插入顺序保存任务记录。容量约束只作用于等待中的任务：
/// 终态任务继续占位以供查询，直到被清扫器按保留期清除。
/// 本结构自身不做并发防护，由持有者加锁。
pub struct TaskQueue {
    tasks: VecDeque<Task>,
    max_pending: usize,
}

impl TaskQueue {
    /// 创建新的任务队列
    ///
    /// # 参数
    ///
    /// * `max_pending` - 等待中任务数上限
    pub fn new(max_pending: usize) -> Self {
        Self {
            tasks: VecDeque::new(),
            max_pending,
        }
    }

    /// 入队任务
    ///
    /// 等待中任务数已达上限时拒绝，任务不会被创建进队列。
    ///
    /// # 参数
    ///
    /// * `task` - 要入队的任务
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 入队成功，任务立即对查询可见
    /// * `Err(SchedulerError::QueueOverflow)` - 队列已满
    pub fn enqueue(&mut self, task: Task) -> Result<(), SchedulerError> {
        let pending = self.pending_count();
        if pending >= self.max_pending {
            return Err(SchedulerError::QueueOverflow {
                current: pending,
                max: self.max_pending,
            });
        }
        self.tasks.push_back(task);
        Ok(())
    }

    /// 查找下一个可运行的等待中任务
    ///
    /// 按插入顺序扫描全部等待中的任务，返回第一个通过谓词检查的。
    /// 被容量卡住的队首任务不会阻塞其后约束不同的任务。
    ///
    /// # 参数
    ///
    /// * `pred` - 以(model, provider)判断是否有可用并发额度
    pub fn next_runnable_mut(
        &mut self,
        pred: impl Fn(&str, &str) -> bool,
    ) -> Option<&mut Task> {
        self.tasks
            .iter_mut()
            .filter(|t| t.status == TaskStatus::Pending)
            .find(|t| pred(&t.model, &t.provider))
    }

    /// 按ID查找任务
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// 按ID查找任务（可变）
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// 计算任务在等待队列中的位置
    ///
    /// # 返回值
    ///
    /// 返回1起始的排名，仅统计等待中的任务；任务不在等待中时返回None
    pub fn position(&self, id: &str) -> Option<usize> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .position(|t| t.id == id)
            .map(|idx| idx + 1)
    }

    /// 清理过期的终态任务
    ///
    /// 删除终态时间（缺省回退到创建时间）早于保留期的终态任务。
    /// 等待中和运行中的任务无论多旧都不触碰，避免丢失长任务。
    ///
    /// # 参数
    ///
    /// * `retention` - 保留时长
    /// * `now` - 当前时间
    ///
    /// # 返回值
    ///
    /// 返回删除的任务数
    pub fn cleanup(&mut self, retention: Duration, now: DateTime<Utc>) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| {
            if !t.status.is_terminal() {
                return true;
            }
            let reference = t.completed_at.unwrap_or(t.created_at);
            now - reference <= retention
        });
        before - self.tasks.len()
    }

    /// 统计等待中的任务数
    pub fn pending_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .count()
    }

    /// 获取队列统计信息
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.tasks.len(),
            max_queue_size: self.max_pending,
            ..Default::default()
        };
        for task in &self.tasks {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats.queue_size = stats.pending;
        stats
    }
}
