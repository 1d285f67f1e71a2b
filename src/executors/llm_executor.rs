// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::settings::ExecutorSettings;
use crate::domain::models::task::AgentArgs;
use crate::executors::traits::{AgentExecutor, AgentOutcome, ExecutorError, TokenUsage};

/// LLM执行器 - 通过OpenAI兼容接口执行代理调用
///
/// # 功能
///
/// 将一次代理调用映射为一次chat completions请求。单回合执行，
/// 参数中的回合数上限在这里不生效。
///
/// # 配置
///
/// - `executor.api_key` - API密钥，未配置时执行直接失败
/// - `executor.api_base_url` - API基础URL
/// - `executor.default_model` - 参数未指定模型时的兜底模型
pub struct LlmExecutor {
    client: reqwest::Client,
    api_key: Option<String>,
    api_base_url: String,
    default_model: String,
}

impl LlmExecutor {
    /// 创建新的LLM执行器实例
    ///
    /// # 参数
    ///
    /// * `settings` - 执行器配置
    pub fn new(settings: &ExecutorSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            api_key: settings.api_key.clone(),
            api_base_url: settings.api_base_url.clone(),
            default_model: settings.default_model.clone(),
        }
    }

    /// 构造系统提示
    ///
    /// 代理名称和工作目录上下文拼入系统消息，其余参数原样使用
    fn build_system_prompt(args: &AgentArgs) -> String {
        let mut prompt = match &args.agent_name {
            Some(name) => format!("You are the agent \"{}\".", name),
            None => "You are a helpful agent.".to_string(),
        };
        if let Some(dir) = &args.working_dir {
            prompt.push_str(&format!(" Working directory: {}", dir));
        }
        prompt
    }
}

#[async_trait]
impl AgentExecutor for LlmExecutor {
    /// 执行一次代理调用
    ///
    /// # 参数
    ///
    /// * `args` - 代理调用参数
    ///
    /// # 返回值
    ///
    /// * `Ok(AgentOutcome)` - 代理产出与令牌统计
    /// * `Err(ExecutorError)` - 密钥未配置、网络失败或响应异常
    async fn execute(&self, args: &AgentArgs) -> Result<AgentOutcome, ExecutorError> {
        let api_key = self.api_key.as_ref().ok_or(ExecutorError::NotConfigured)?;

        let model = args.model.as_deref().unwrap_or(&self.default_model);
        let request_body = json!({
            "model": model,
            "messages": [
                {
                    "role": "system",
                    "content": Self::build_system_prompt(args)
                },
                {
                    "role": "user",
                    "content": args.prompt
                }
            ],
            "temperature": 0.2
        });

        let url = format!("{}/chat/completions", self.api_base_url);
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ExecutorError::Api { status, message });
        }

        let body: Value = response.json().await?;

        let usage = if let Some(usage_val) = body.get("usage") {
            TokenUsage {
                prompt_tokens: usage_val["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: usage_val["completion_tokens"].as_u64().unwrap_or(0) as u32,
                total_tokens: usage_val["total_tokens"].as_u64().unwrap_or(0) as u32,
            }
        } else {
            TokenUsage::default()
        };

        match body["choices"][0]["message"]["content"].as_str() {
            Some(content) => Ok(AgentOutcome {
                content: content.to_string(),
                usage,
            }),
            None => Err(ExecutorError::InvalidResponse(
                "missing choices[0].message.content".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "llm"
    }
}
