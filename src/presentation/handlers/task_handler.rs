// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Path},
    Json,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::warn;
use validator::Validate;

use crate::application::dto::launch_request::{LaunchRequestDto, LaunchResponseDto};
use crate::application::dto::task_query_request::{
    CancelResponseDto, StatsResponseDto, TaskInfoDto, TaskStatusResponseDto,
};
use crate::presentation::errors::AppError;
use crate::scheduler::background_manager::BackgroundManager;
use crate::utils::errors::SchedulerError;

/// 智能轮询等待任务完成
///
/// # 参数
/// * `manager` - 后台管理器
/// * `task_ids` - 要等待的任务ID列表
/// * `sync_wait_ms` - 同步等待时间（毫秒）
/// * `base_poll_interval_ms` - 基础轮询间隔（毫秒）
///
/// # 返回值
/// * `Ok(())` - 所有任务完成
/// * `Err(SchedulerError::PipelineTimeout)` - 截止时间已到仍有未完成任务
///
/// # 智能轮询逻辑
/// - 初始轮询间隔：base_poll_interval_ms
/// - 动态调整范围：500ms - 2000ms
/// - 根据任务完成进度调整间隔
/// - 任务完成率越高，轮询间隔越长
pub async fn wait_for_tasks_completion(
    manager: &BackgroundManager,
    task_ids: &[String],
    sync_wait_ms: u64,
    base_poll_interval_ms: u64,
) -> Result<(), SchedulerError> {
    let start_time = Instant::now();
    let timeout_duration = Duration::from_millis(sync_wait_ms);
    let min_interval = 500u64; // 最小轮询间隔 500ms
    let max_interval = 2000u64; // 最大轮询间隔 2000ms

    let mut current_interval = base_poll_interval_ms.clamp(min_interval, max_interval);
    let mut last_completion_rate = 0.0f64;

    while start_time.elapsed() < timeout_duration {
        // 统计已进入终态的任务
        let completed_count = task_ids
            .iter()
            .filter(|id| {
                manager
                    .poll(id)
                    .task
                    .map(|t| t.status.is_terminal())
                    .unwrap_or(true)
            })
            .count();

        let completion_rate = if task_ids.is_empty() {
            1.0
        } else {
            completed_count as f64 / task_ids.len() as f64
        };

        // 如果所有任务都已完成，立即返回
        if completion_rate >= 1.0 {
            return Ok(());
        }

        // 动态调整轮询间隔
        // - 完成率提升时，增加轮询间隔
        // - 完成率下降或不变时，减少轮询间隔
        let completion_progress = completion_rate - last_completion_rate;
        let rate_based_interval =
            min_interval + ((max_interval - min_interval) as f64 * completion_rate) as u64;

        if completion_progress > 0.0 {
            current_interval = ((current_interval as f64 * 1.2).max(rate_based_interval as f64)
                as u64)
                .clamp(min_interval, max_interval);
        } else {
            current_interval = rate_based_interval.clamp(min_interval, max_interval);
        }

        last_completion_rate = completion_rate;

        // 等待下一轮轮询，但确保不会超出截止时间
        let remaining_time = timeout_duration.saturating_sub(start_time.elapsed());
        let wait_duration = Duration::from_millis(current_interval).min(remaining_time);

        if !wait_duration.is_zero() {
            sleep(wait_duration).await;
        }
    }

    Err(SchedulerError::PipelineTimeout {
        deadline_ms: sync_wait_ms,
    })
}

/// 任务提交处理器
///
/// 校验请求后将任务交给后台管理器，默认立即返回回执；
/// 请求了同步等待时在截止时间内轮询任务完成。
pub async fn launch_task(
    Extension(manager): Extension<Arc<BackgroundManager>>,
    Json(request): Json<LaunchRequestDto>,
) -> Result<Json<LaunchResponseDto>, AppError> {
    request.validate()?;

    let sync_wait_ms = request.sync_wait_ms;
    let receipt = manager.launch(request.into())?;

    let mut final_status = None;
    if let Some(wait_ms) = sync_wait_ms {
        let ids = [receipt.task_id.clone()];
        if let Err(e) = wait_for_tasks_completion(&manager, &ids, wait_ms, 500).await {
            // 截止时间到达不算请求失败，返回当前状态即可
            warn!("Sync wait ended early: {}", e);
        }
        final_status = manager
            .poll(&receipt.task_id)
            .task
            .map(|t| t.status.to_string());
    }

    Ok(Json(LaunchResponseDto {
        task_id: receipt.task_id,
        message: receipt.message,
        final_status,
    }))
}

/// 任务状态查询处理器
pub async fn poll_task(
    Extension(manager): Extension<Arc<BackgroundManager>>,
    Path(id): Path<String>,
) -> Json<TaskStatusResponseDto> {
    let report = manager.poll(&id);
    Json(TaskStatusResponseDto {
        message: report.message,
        task: report.task.as_ref().map(TaskInfoDto::from),
    })
}

/// 任务取消处理器
pub async fn cancel_task(
    Extension(manager): Extension<Arc<BackgroundManager>>,
    Path(id): Path<String>,
) -> Json<CancelResponseDto> {
    let report = manager.cancel(&id);
    Json(CancelResponseDto {
        message: report.message,
        status: report.task.map(|t| t.status.to_string()),
    })
}

/// 统计信息处理器
pub async fn get_stats(
    Extension(manager): Extension<Arc<BackgroundManager>>,
) -> Json<StatsResponseDto> {
    let stats = manager.stats();
    Json(StatsResponseDto {
        message: stats.message,
        queue: stats.queue,
        concurrency: stats.concurrency,
    })
}
