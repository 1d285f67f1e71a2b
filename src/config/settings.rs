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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;

/// 应用程序配置设置
///
/// 包含服务器、调度器、并发控制和执行器等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 服务器配置
    pub server: ServerSettings,
    /// 调度器配置
    pub scheduler: SchedulerSettings,
    /// 并发控制配置
    pub concurrency: ConcurrencySettings,
    /// 执行器配置
    pub executor: ExecutorSettings,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 调度器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// 等待中任务数上限，超出后入队被拒绝
    pub max_queue_size: usize,
    /// 单任务执行超时（毫秒）
    pub task_timeout_ms: u64,
    /// 终态任务保留时长（秒），到期后由清扫器清除
    pub stale_retention_secs: u64,
    /// 清扫器运行周期（秒）
    pub sweep_interval_secs: u64,
    /// 调用参数未指定模型时使用的默认模型
    pub default_model: String,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_queue_size: 100,
            task_timeout_ms: 180_000,
            stale_retention_secs: 86_400,
            sweep_interval_secs: 600,
            default_model: "gpt-4o-mini".to_string(),
        }
    }
}

/// 并发控制配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrencySettings {
    /// 未单独配置的模型的默认并发上限
    pub default_model_limit: usize,
    /// 未单独配置的服务商的默认并发上限
    pub default_provider_limit: usize,
    /// 按模型的并发上限
    #[serde(default)]
    pub model_limits: HashMap<String, usize>,
    /// 按服务商的并发上限
    #[serde(default)]
    pub provider_limits: HashMap<String, usize>,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            default_model_limit: 3,
            default_provider_limit: 10,
            model_limits: HashMap::new(),
            provider_limits: HashMap::new(),
        }
    }
}

/// 执行器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSettings {
    /// API基础URL
    pub api_base_url: String,
    /// API密钥
    pub api_key: Option<String>,
    /// 单次HTTP请求超时（秒）
    pub request_timeout_secs: u64,
    /// 兜底模型
    pub default_model: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Start with default settings
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            // Default Scheduler settings
            .set_default("scheduler.max_queue_size", 100)?
            .set_default("scheduler.task_timeout_ms", 180_000)?
            .set_default("scheduler.stale_retention_secs", 86_400)?
            .set_default("scheduler.sweep_interval_secs", 600)?
            .set_default("scheduler.default_model", "gpt-4o-mini")?
            // Default Concurrency settings
            .set_default("concurrency.default_model_limit", 3)?
            .set_default("concurrency.default_provider_limit", 10)?
            // Default Executor settings
            .set_default("executor.api_base_url", "https://api.openai.com/v1")?
            .set_default("executor.request_timeout_secs", 120)?
            .set_default("executor.default_model", "gpt-4o-mini")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("AGENTRS").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
