// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::executors::traits::AgentOutcome;

/// 任务ID随机后缀的字符集与长度
const ID_SUFFIX_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_SUFFIX_LEN: usize = 8;

/// 代理调用参数
///
/// 调度器除提取模型外不解释其内容，整体透传给执行器。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentArgs {
    /// 提示词文本
    pub prompt: String,
    /// 代理名称，用于构造执行器的系统提示
    pub agent_name: Option<String>,
    /// 模型标识，缺省时由调度器填入默认模型
    pub model: Option<String>,
    /// 回合数上限，透传给支持多回合的执行器
    pub max_turns: Option<u32>,
    /// 工作目录上下文
    pub working_dir: Option<String>,
}

/// 任务实体
///
/// 表示一次可调度的后台代理调用。任务一经创建便拥有不可变的ID，
/// 状态沿 pending → running → {completed|failed|cancelled} 单向迁移，
/// pending → cancelled 也是合法路径（启动前取消）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// 任务唯一标识符，入队时生成，形如 task-<毫秒时间戳>-<随机后缀>
    pub id: String,
    /// 任务状态，终态后不再变化
    pub status: TaskStatus,
    /// 代理调用参数
    pub args: AgentArgs,
    /// 模型标识，用于并发计数
    pub model: String,
    /// 服务商，由模型确定性推导，用于第二维并发计数
    pub provider: String,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 开始执行时间
    pub started_at: Option<DateTime<Utc>>,
    /// 终态时间，当且仅当任务进入终态时设置
    pub completed_at: Option<DateTime<Utc>>,
    /// 执行结果，仅在完成时设置，与error互斥
    pub result: Option<AgentOutcome>,
    /// 错误文本，仅在失败时设置，与result互斥
    pub error: Option<String>,
}

/// 任务状态枚举
///
/// 状态转换遵循以下流程：
/// Pending → Running → Completed/Failed/Cancelled，以及 Pending → Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 等待中，任务已入队但尚未开始执行
    #[default]
    Pending,
    /// 运行中，任务正在被执行
    Running,
    /// 已完成，任务成功执行完成
    Completed,
    /// 已失败，任务执行失败或超时
    Failed,
    /// 已取消，任务被取消执行
    Cancelled,
}

impl TaskStatus {
    /// 判断状态是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换，当任务状态转换不符合生命周期规则时发生
    #[error("Invalid state transition")]
    InvalidStateTransition,
}

impl Task {
    /// 创建一个新的任务
    ///
    /// # 参数
    ///
    /// * `args` - 代理调用参数
    /// * `model` - 已解析的模型标识
    /// * `provider` - 由模型推导出的服务商
    ///
    /// # 返回值
    ///
    /// 返回状态为Pending的新任务实例
    pub fn new(args: AgentArgs, model: String, provider: String) -> Self {
        Self {
            id: generate_task_id(),
            status: TaskStatus::Pending,
            args,
            model,
            provider,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// 启动任务
    ///
    /// 将任务状态从Pending变更为Running并记录开始时间
    pub fn start(&mut self) -> Result<(), DomainError> {
        match self.status {
            TaskStatus::Pending => {
                self.status = TaskStatus::Running;
                self.started_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 完成任务
    ///
    /// 将任务状态从Running变更为Completed并记录结果
    pub fn complete(&mut self, result: AgentOutcome) -> Result<(), DomainError> {
        match self.status {
            TaskStatus::Running => {
                self.status = TaskStatus::Completed;
                self.completed_at = Some(Utc::now());
                self.result = Some(result);
                Ok(())
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 标记任务失败
    ///
    /// 将任务状态从Running变更为Failed并记录错误文本
    pub fn fail(&mut self, error: String) -> Result<(), DomainError> {
        match self.status {
            TaskStatus::Running => {
                self.status = TaskStatus::Failed;
                self.completed_at = Some(Utc::now());
                self.error = Some(error);
                Ok(())
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 取消任务
    ///
    /// Pending和Running状态的任务均可取消
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        match self.status {
            TaskStatus::Pending | TaskStatus::Running => {
                self.status = TaskStatus::Cancelled;
                self.completed_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 计算任务执行耗时（毫秒）
    ///
    /// 仅当开始和终态时间均已记录时返回
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => {
                Some((completed - started).num_milliseconds())
            }
            _ => None,
        }
    }
}

/// 生成任务ID
///
/// 格式为 task-<毫秒时间戳>-<8位小写字母数字后缀>
fn generate_task_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_SUFFIX_CHARS[rng.random_range(0..ID_SUFFIX_CHARS.len())] as char)
        .collect();
    format!("task-{}-{}", Utc::now().timestamp_millis(), suffix)
}
