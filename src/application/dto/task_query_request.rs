// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::task::Task;
use crate::executors::traits::AgentOutcome;
use crate::scheduler::concurrency::ConcurrencySnapshot;
use crate::scheduler::task_queue::QueueStats;

/// 任务信息数据传输对象
#[derive(Debug, Deserialize, Serialize)]
pub struct TaskInfoDto {
    /// 任务ID
    pub id: String,
    /// 任务状态
    pub status: String,
    /// 模型标识
    pub model: String,
    /// 服务商
    pub provider: String,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 开始执行时间
    pub started_at: Option<DateTime<Utc>>,
    /// 终态时间
    pub completed_at: Option<DateTime<Utc>>,
    /// 执行耗时（毫秒）
    pub duration_ms: Option<i64>,
    /// 执行结果
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AgentOutcome>,
    /// 错误文本
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Task> for TaskInfoDto {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            status: task.status.to_string(),
            model: task.model.clone(),
            provider: task.provider.clone(),
            created_at: task.created_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
            duration_ms: task.duration_ms(),
            result: task.result.clone(),
            error: task.error.clone(),
        }
    }
}

/// 任务状态查询响应数据传输对象
#[derive(Debug, Deserialize, Serialize)]
pub struct TaskStatusResponseDto {
    /// 状态消息
    pub message: String,
    /// 任务信息，任务不存在时为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskInfoDto>,
}

/// 任务取消响应数据传输对象
#[derive(Debug, Deserialize, Serialize)]
pub struct CancelResponseDto {
    /// 结果消息
    pub message: String,
    /// 取消后的任务状态
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// 统计信息响应数据传输对象
#[derive(Debug, Serialize)]
pub struct StatsResponseDto {
    /// 汇总消息
    pub message: String,
    /// 队列统计
    pub queue: QueueStats,
    /// 并发状态快照
    pub concurrency: ConcurrencySnapshot,
}
