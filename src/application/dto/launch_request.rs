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

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::models::task::AgentArgs;

/// 任务提交请求数据传输对象
///
/// 用于封装客户端发起的后台代理调用请求的相关参数
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct LaunchRequestDto {
    /// 提示词文本
    #[validate(length(min = 1, message = "prompt cannot be empty"))]
    pub prompt: String,
    /// 代理名称
    pub agent_name: Option<String>,
    /// 模型标识
    pub model: Option<String>,
    /// 回合数上限
    pub max_turns: Option<u32>,
    /// 工作目录上下文
    pub working_dir: Option<String>,
    /// 同步等待时间（毫秒），设置后处理器在响应前等待任务完成
    pub sync_wait_ms: Option<u64>,
}

impl From<LaunchRequestDto> for AgentArgs {
    fn from(dto: LaunchRequestDto) -> Self {
        AgentArgs {
            prompt: dto.prompt,
            agent_name: dto.agent_name,
            model: dto.model,
            max_turns: dto.max_turns,
            working_dir: dto.working_dir,
        }
    }
}

/// 任务提交响应数据传输对象
#[derive(Debug, Deserialize, Serialize)]
pub struct LaunchResponseDto {
    /// 新任务的ID
    pub task_id: String,
    /// 回执消息
    pub message: String,
    /// 同步等待后的最终状态，仅在请求了同步等待时出现
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_status: Option<String>,
}
