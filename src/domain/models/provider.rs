// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 模型前缀到服务商的映射表
///
/// 按前缀长度降序排列，先命中更长的前缀
const PROVIDER_PREFIXES: &[(&str, &str)] = &[
    ("deepseek", "deepseek"),
    ("claude", "anthropic"),
    ("gemini", "google"),
    ("qwen", "alibaba"),
    ("gpt", "openai"),
    ("glm", "zhipu"),
    ("o1", "openai"),
    ("o3", "openai"),
    ("o4", "openai"),
];

/// 未命中任何前缀时使用的默认服务商桶
pub const DEFAULT_PROVIDER: &str = "default";

/// 从模型标识推导服务商
///
/// 对模型名做前缀匹配，未命中时归入默认桶。推导是确定性的，
/// 同一模型永远落在同一个服务商桶里，用于第二维并发计数。
///
/// # 参数
///
/// * `model` - 模型标识符
///
/// # 返回值
///
/// 返回服务商名称
pub fn derive_provider(model: &str) -> &'static str {
    let normalized = model.to_ascii_lowercase();
    for (prefix, provider) in PROVIDER_PREFIXES {
        if normalized.starts_with(prefix) {
            return provider;
        }
    }
    DEFAULT_PROVIDER
}
