// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::support::{
    args_for, concurrency_with_model_limit, manager_with, wait_until_terminal, MockExecutor,
};
use agentrs::config::settings::{ConcurrencySettings, SchedulerSettings};
use agentrs::domain::models::task::TaskStatus;
use agentrs::utils::errors::SchedulerError;
use futures::future::join_all;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_launch_returns_quickly_with_slow_executor() {
    // Given: 执行一次需要5秒的执行器
    let manager = manager_with(
        Arc::new(MockExecutor::with_delay(Duration::from_secs(5))),
        SchedulerSettings::default(),
        ConcurrencySettings::default(),
    );
    manager.start();

    let started = Instant::now();
    let receipt = manager.launch(args_for("Test task", None)).unwrap();

    // Then: 提交与执行器快慢无关
    assert!(started.elapsed() < Duration::from_millis(100));
    assert!(receipt.message.contains("Task queued"));

    let pattern = Regex::new(r"^task-\d+-[a-z0-9]+$").unwrap();
    assert!(pattern.is_match(&receipt.task_id));
}

#[tokio::test]
async fn test_poll_unknown_task_reports_not_found() {
    let manager = manager_with(
        Arc::new(MockExecutor::instant()),
        SchedulerSettings::default(),
        ConcurrencySettings::default(),
    );

    let report = manager.poll("nonexistent");

    assert!(report.message.contains("not found"));
    assert!(report.task.is_none());
}

#[tokio::test]
async fn test_model_ceiling_limits_running_tasks() {
    // Given: 模型上限3，慢执行器
    let manager = manager_with(
        Arc::new(MockExecutor::with_delay(Duration::from_millis(500))),
        SchedulerSettings::default(),
        concurrency_with_model_limit("test-model", 3),
    );
    manager.start();

    let receipts: Vec<_> = (0..5)
        .map(|i| {
            manager
                .launch(args_for(&format!("task {}", i), Some("test-model")))
                .unwrap()
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(150)).await;

    // Then: 恰好3个运行中，2个等待
    let stats = manager.stats();
    assert_eq!(stats.queue.running, 3);
    assert_eq!(stats.queue.pending, 2);
    assert_eq!(stats.concurrency.models.get("test-model"), Some(&3));

    // 压测期间任意采样点都不超限
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let stats = manager.stats();
        assert!(stats.queue.running <= 3, "ceiling violated: {:?}", stats.queue);
    }

    // 最终全部完成
    let waits = receipts
        .iter()
        .map(|r| wait_until_terminal(&manager, &r.task_id, Duration::from_secs(5)));
    assert!(join_all(waits).await.into_iter().all(|done| done));
    assert_eq!(manager.stats().queue.completed, 5);
}

#[tokio::test]
async fn test_freed_capacity_unblocks_pending_tasks() {
    // Given: 模型上限1
    let manager = manager_with(
        Arc::new(MockExecutor::with_delay(Duration::from_millis(100))),
        SchedulerSettings::default(),
        concurrency_with_model_limit("test-model", 1),
    );
    manager.start();

    let first = manager.launch(args_for("first", Some("test-model"))).unwrap();
    let second = manager
        .launch(args_for("second", Some("test-model")))
        .unwrap();

    assert!(wait_until_terminal(&manager, &first.task_id, Duration::from_secs(2)).await);
    // Then: 额度释放后第二个任务被晋升并完成
    assert!(wait_until_terminal(&manager, &second.task_id, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_blocked_head_does_not_stall_other_models() {
    // Given: 队首模型额度为0，其后模型正常
    let mut concurrency = ConcurrencySettings::default();
    concurrency.model_limits.insert("blocked-model".to_string(), 0);
    let manager = manager_with(
        Arc::new(MockExecutor::instant()),
        SchedulerSettings::default(),
        concurrency,
    );
    manager.start();

    let blocked = manager
        .launch(args_for("stuck", Some("blocked-model")))
        .unwrap();
    let free = manager.launch(args_for("goes", Some("gpt-4o-mini"))).unwrap();

    // Then: 后面的任务照常完成，队首仍然等待
    assert!(wait_until_terminal(&manager, &free.task_id, Duration::from_secs(2)).await);
    let report = manager.poll(&blocked.task_id);
    assert_eq!(report.task.unwrap().status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_queue_overflow_rejects_without_creating_task() {
    // Given: 不启动排水循环，任务全部停在等待中
    let manager = manager_with(
        Arc::new(MockExecutor::instant()),
        SchedulerSettings::default(),
        ConcurrencySettings::default(),
    );

    for i in 0..100 {
        manager
            .launch(args_for(&format!("task {}", i), None))
            .unwrap();
    }

    // When: 第101个任务入队
    let result = manager.launch(args_for("one too many", None));

    match result {
        Err(SchedulerError::QueueOverflow { current, max }) => {
            assert_eq!(current, 100);
            assert_eq!(max, 100);
        }
        other => panic!("expected overflow, got {:?}", other.map(|r| r.task_id)),
    }
    // Then: 总数没有增长
    assert_eq!(manager.stats().queue.total, 100);
}

#[tokio::test]
async fn test_cancel_pending_task_before_promotion() {
    // Given: 排水循环未启动，任务停在等待中
    let executor = Arc::new(MockExecutor::instant());
    let manager = manager_with(
        executor.clone(),
        SchedulerSettings::default(),
        ConcurrencySettings::default(),
    );

    let receipt = manager.launch(args_for("cancel me", None)).unwrap();
    let report = manager.cancel(&receipt.task_id);
    assert!(report.message.contains("cancelled"));

    // When: 之后排水循环启动
    manager.start();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Then: 任务保持已取消，从未到达执行器
    let polled = manager.poll(&receipt.task_id);
    assert!(polled.message.contains("cancelled"));
    assert_eq!(polled.task.unwrap().status, TaskStatus::Cancelled);
    assert_eq!(executor.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_running_task_releases_slot() {
    // Given: 模型上限1，长任务占住额度
    let manager = manager_with(
        Arc::new(MockExecutor::with_delay(Duration::from_secs(10))),
        SchedulerSettings::default(),
        concurrency_with_model_limit("test-model", 1),
    );
    manager.start();

    let first = manager.launch(args_for("long", Some("test-model"))).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        manager.poll(&first.task_id).task.unwrap().status,
        TaskStatus::Running
    );

    let second = manager.launch(args_for("next", Some("test-model"))).unwrap();

    // When: 取消运行中的任务
    let report = manager.cancel(&first.task_id);
    assert!(report.message.contains("cancelled"));

    // Then: 额度释放，第二个任务被晋升
    tokio::time::sleep(Duration::from_millis(200)).await;
    let status = manager.poll(&second.task_id).task.unwrap().status;
    assert!(
        status == TaskStatus::Running || status == TaskStatus::Completed,
        "second task should have been promoted, got {}",
        status
    );
}

#[tokio::test]
async fn test_cancel_completed_task_is_noop() {
    let manager = manager_with(
        Arc::new(MockExecutor::instant()),
        SchedulerSettings::default(),
        ConcurrencySettings::default(),
    );
    manager.start();

    let receipt = manager.launch(args_for("quick", None)).unwrap();
    assert!(wait_until_terminal(&manager, &receipt.task_id, Duration::from_secs(2)).await);

    // When: 取消已完成的任务
    let report = manager.cancel(&receipt.task_id);

    // Then: 返回already completed，结果不受影响
    assert!(report.message.contains("already completed"));
    let polled = manager.poll(&receipt.task_id);
    let task = polled.task.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result.unwrap().content, "echo: quick");
}

#[tokio::test]
async fn test_timeout_marks_task_failed() {
    // Given: 超时200ms，执行器需要10秒
    let scheduler = SchedulerSettings {
        task_timeout_ms: 200,
        ..SchedulerSettings::default()
    };
    let manager = manager_with(
        Arc::new(MockExecutor::with_delay(Duration::from_secs(10))),
        scheduler,
        ConcurrencySettings::default(),
    );
    manager.start();

    let receipt = manager.launch(args_for("slow", None)).unwrap();
    assert!(wait_until_terminal(&manager, &receipt.task_id, Duration::from_secs(2)).await);

    let report = manager.poll(&receipt.task_id);
    let task = report.task.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().contains("exceeded timeout: 200ms"));

    // 额度已释放
    assert!(manager.stats().concurrency.models.is_empty());
}

#[tokio::test]
async fn test_timeout_error_text_at_default() {
    // 默认超时的错误文案
    let err = SchedulerError::TaskTimeout { timeout_ms: 180_000 };
    assert!(err.to_string().contains("exceeded timeout: 180000ms"));
}

#[tokio::test]
async fn test_executor_failure_recorded_on_task() {
    let manager = manager_with(
        Arc::new(MockExecutor::failing("model is overloaded")),
        SchedulerSettings::default(),
        ConcurrencySettings::default(),
    );
    manager.start();

    let receipt = manager.launch(args_for("doomed", None)).unwrap();
    assert!(wait_until_terminal(&manager, &receipt.task_id, Duration::from_secs(2)).await);

    let report = manager.poll(&receipt.task_id);
    assert!(report.message.contains("failed"));
    let task = report.task.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    let error = task.error.unwrap();
    assert!(error.contains("Agent execution failed"));
    assert!(error.contains("model is overloaded"));
}

#[tokio::test]
async fn test_stats_after_mixed_outcomes() {
    // Given: 3个完成的任务和2个等不到额度的任务
    let mut concurrency = ConcurrencySettings::default();
    concurrency.model_limits.insert("blocked-model".to_string(), 0);
    let manager = manager_with(
        Arc::new(MockExecutor::instant()),
        SchedulerSettings::default(),
        concurrency,
    );
    manager.start();

    for i in 0..3 {
        let receipt = manager
            .launch(args_for(&format!("done {}", i), Some("gpt-4o-mini")))
            .unwrap();
        assert!(wait_until_terminal(&manager, &receipt.task_id, Duration::from_secs(2)).await);
    }
    for i in 0..2 {
        manager
            .launch(args_for(&format!("waiting {}", i), Some("blocked-model")))
            .unwrap();
    }

    let stats = manager.stats();
    assert_eq!(stats.queue.total, 5);
    assert_eq!(stats.queue.completed, 3);
    assert_eq!(stats.queue.pending, 2);
    assert_eq!(stats.queue.queue_size, 2);
    assert_eq!(stats.queue.max_queue_size, 100);
    assert!(stats.message.contains("5 tasks total"));
}

#[tokio::test]
async fn test_status_sequence_never_regresses() {
    let manager = manager_with(
        Arc::new(MockExecutor::with_delay(Duration::from_millis(200))),
        SchedulerSettings::default(),
        ConcurrencySettings::default(),
    );
    manager.start();

    let receipt = manager.launch(args_for("observe me", None)).unwrap();

    fn rank(status: TaskStatus) -> u8 {
        match status {
            TaskStatus::Pending => 0,
            TaskStatus::Running => 1,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => 2,
        }
    }

    let mut last = 0u8;
    for _ in 0..60 {
        let status = manager.poll(&receipt.task_id).task.unwrap().status;
        let current = rank(status);
        assert!(current >= last, "status regressed");
        last = current;
        if current == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(last, 2);
}

#[tokio::test]
async fn test_pending_position_is_recomputed() {
    // Given: 排水循环未启动
    let manager = manager_with(
        Arc::new(MockExecutor::instant()),
        SchedulerSettings::default(),
        ConcurrencySettings::default(),
    );

    let first = manager.launch(args_for("first", None)).unwrap();
    let second = manager.launch(args_for("second", None)).unwrap();

    assert!(manager
        .poll(&second.task_id)
        .message
        .contains("position 2 in queue"));

    // When: 前面的任务被取消
    manager.cancel(&first.task_id);

    // Then: 排名随之前移
    assert!(manager
        .poll(&second.task_id)
        .message
        .contains("position 1 in queue"));
}
