// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::task::AgentArgs;

/// 令牌使用统计
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// 代理执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    /// 代理产出的文本内容
    pub content: String,
    /// 本次调用的令牌使用情况
    pub usage: TokenUsage,
}

/// 执行器错误类型
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// 执行器未配置API密钥
    #[error("Executor API key not configured")]
    NotConfigured,

    /// 网络请求失败
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// 远端API返回错误状态
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// 响应体不符合预期结构
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 代理执行器特质
///
/// 调度器面向该接口分发任务。实现方接收完整的调用参数，
/// 最终返回结果或错误；调用可能耗时很长，由调度器负责超时。
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// 执行一次代理调用
    async fn execute(&self, args: &AgentArgs) -> Result<AgentOutcome, ExecutorError>;

    /// 获取执行器名称
    fn name(&self) -> &str;
}
