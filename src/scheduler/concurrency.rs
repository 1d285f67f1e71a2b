// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use crate::config::settings::ConcurrencySettings;

/// 并发状态快照
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConcurrencySnapshot {
    /// 各模型当前运行中的任务数
    pub models: HashMap<String, usize>,
    /// 各服务商当前运行中的任务数
    pub providers: HashMap<String, usize>,
}

/// 并发管理器
///
/// 纯计数簿记：按模型和按服务商各维护一份运行中计数，对照
/// 各自的上限表（带默认值）。不做I/O，不含异步逻辑，由持有者
/// 保证互斥访问。
///
/// `acquire`不自带上限检查，调用方必须先用`can_run`确认额度；
/// 这是刻意保留的分工，检查与占用的原子性由唯一的晋升方
/// （排水循环）的临界区保证。
pub struct ConcurrencyManager {
    model_running: HashMap<String, usize>,
    provider_running: HashMap<String, usize>,
    model_limits: HashMap<String, usize>,
    provider_limits: HashMap<String, usize>,
    default_model_limit: usize,
    default_provider_limit: usize,
}

impl ConcurrencyManager {
    /// 创建新的并发管理器实例
    ///
    /// # 参数
    ///
    /// * `settings` - 并发配置
    pub fn new(settings: &ConcurrencySettings) -> Self {
        Self {
            model_running: HashMap::new(),
            provider_running: HashMap::new(),
            model_limits: settings.model_limits.clone(),
            provider_limits: settings.provider_limits.clone(),
            default_model_limit: settings.default_model_limit,
            default_provider_limit: settings.default_provider_limit,
        }
    }

    /// 判断给定(model, provider)是否还有并发额度
    ///
    /// 两个维度的约束必须同时满足
    pub fn can_run(&self, model: &str, provider: &str) -> bool {
        let model_count = self.model_running.get(model).copied().unwrap_or(0);
        let provider_count = self.provider_running.get(provider).copied().unwrap_or(0);
        model_count < self.model_limit(model) && provider_count < self.provider_limit(provider)
    }

    /// 占用一个并发额度
    ///
    /// 无条件对两个计数各加一。调用方必须已通过`can_run`检查，
    /// 本方法不是闸门。
    pub fn acquire(&mut self, model: &str, provider: &str) {
        *self.model_running.entry(model.to_string()).or_insert(0) += 1;
        *self
            .provider_running
            .entry(provider.to_string())
            .or_insert(0) += 1;
    }

    /// 释放一个并发额度
    ///
    /// 计数下限为零，重复释放不会下溢
    pub fn release(&mut self, model: &str, provider: &str) {
        Self::decrement(&mut self.model_running, model);
        Self::decrement(&mut self.provider_running, provider);
    }

    /// 获取两个计数表的快照
    pub fn status(&self) -> ConcurrencySnapshot {
        ConcurrencySnapshot {
            models: self.model_running.clone(),
            providers: self.provider_running.clone(),
        }
    }

    /// 查询模型当前运行中的任务数
    pub fn running_count(&self, model: &str) -> usize {
        self.model_running.get(model).copied().unwrap_or(0)
    }

    fn model_limit(&self, model: &str) -> usize {
        self.model_limits
            .get(model)
            .copied()
            .unwrap_or(self.default_model_limit)
    }

    fn provider_limit(&self, provider: &str) -> usize {
        self.provider_limits
            .get(provider)
            .copied()
            .unwrap_or(self.default_provider_limit)
    }

    fn decrement(counts: &mut HashMap<String, usize>, key: &str) {
        match counts.get_mut(key) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                counts.remove(key);
            }
            None => {
                warn!("Release without matching acquire for key: {}", key);
            }
        }
    }
}
