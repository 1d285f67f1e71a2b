// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use agentrs::application::dto::launch_request::LaunchResponseDto;
use agentrs::application::dto::task_query_request::{CancelResponseDto, TaskStatusResponseDto};
use agentrs::config::settings::{ConcurrencySettings, SchedulerSettings};
use agentrs::domain::models::task::AgentArgs;
use agentrs::executors::traits::{AgentExecutor, AgentOutcome, ExecutorError, TokenUsage};
use agentrs::presentation::routes;
use agentrs::scheduler::background_manager::BackgroundManager;
use async_trait::async_trait;
use axum::Extension;
use axum_test::TestServer;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

struct EchoExecutor;

#[async_trait]
impl AgentExecutor for EchoExecutor {
    async fn execute(&self, args: &AgentArgs) -> Result<AgentOutcome, ExecutorError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(AgentOutcome {
            content: format!("handled: {}", args.prompt),
            usage: TokenUsage {
                prompt_tokens: 8,
                completion_tokens: 4,
                total_tokens: 12,
            },
        })
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// 完整用户旅程：提交 → 轮询直至完成 → 校验结果 → 统计 → 重复取消
#[tokio::test]
async fn test_complete_task_workflow() {
    let manager = BackgroundManager::new(
        Arc::new(EchoExecutor),
        SchedulerSettings::default(),
        &ConcurrencySettings::default(),
    );
    manager.start();
    let server = TestServer::new(routes::routes().layer(Extension(manager)))
        .expect("test server should start");

    // 1. 提交任务
    let launch: LaunchResponseDto = server
        .post("/v1/tasks")
        .json(&json!({
            "prompt": "summarize the report",
            "agent_name": "summarizer",
            "model": "claude-sonnet-4"
        }))
        .await
        .json();
    assert!(launch.message.contains("Task queued"));

    // 2. 轮询直至完成
    let url = format!("/v1/tasks/{}", launch.task_id);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    let task = loop {
        let body: TaskStatusResponseDto = server.get(&url).await.json();
        if let Some(task) = body.task {
            if task.status == "completed" {
                break task;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task did not complete in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    };

    // 3. 校验结果与归属
    assert_eq!(task.model, "claude-sonnet-4");
    assert_eq!(task.provider, "anthropic");
    let result = task.result.expect("completed task carries a result");
    assert_eq!(result.content, "handled: summarize the report");
    assert_eq!(result.usage.total_tokens, 12);

    // 4. 统计反映完成情况
    let stats: Value = server.get("/v1/stats").await.json();
    assert_eq!(stats["queue"]["completed"], 1);
    assert_eq!(stats["queue"]["total"], 1);
    assert_eq!(stats["concurrency"]["models"], json!({}));

    // 5. 对已完成任务的取消是幂等的no-op
    let cancel: CancelResponseDto = server.delete(&url).await.json();
    assert!(cancel.message.contains("already completed"));

    let after: TaskStatusResponseDto = server.get(&url).await.json();
    assert_eq!(after.task.unwrap().status, "completed");
}
