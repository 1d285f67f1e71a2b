// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// 调度器错误类型
///
/// 覆盖任务从入队到结束整个生命周期中可能出现的失败情况。
/// 入队前的错误（队列溢出）同步返回给调用方；执行期间的错误
/// 只记录在任务上，通过轮询接口观察。
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// 队列溢出，等待中的任务数已达上限
    #[error("Queue overflow: {current} pending tasks, limit is {max}")]
    QueueOverflow { current: usize, max: usize },

    /// 任务执行超时
    #[error("Task exceeded timeout: {timeout_ms}ms")]
    TaskTimeout { timeout_ms: u64 },

    /// 多任务等待超过截止时间，由上层组合调用产生
    #[error("Pipeline exceeded deadline: {deadline_ms}ms")]
    PipelineTimeout { deadline_ms: u64 },

    /// 代理执行失败
    #[error("Agent execution failed: {0}")]
    AgentExecution(String),
}
