// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// 初始化指标系统
///
/// 安装Prometheus导出器并注册任务调度相关的指标
pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    let addr: SocketAddr = "0.0.0.0:9000".parse().expect("Invalid metrics address");

    // Start the exporter
    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = builder.with_http_listener(addr).install() {
        tracing::warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
    }

    describe_counter!("agent_tasks_total", "Total number of agent tasks submitted");
    describe_counter!(
        "agent_tasks_completed_total",
        "Total number of agent tasks completed"
    );
    describe_counter!(
        "agent_tasks_failed_total",
        "Total number of agent tasks failed (including timeouts)"
    );
    describe_counter!(
        "agent_tasks_cancelled_total",
        "Total number of agent tasks cancelled"
    );
    describe_gauge!(
        "agent_tasks_running",
        "Number of agent tasks currently running"
    );
    describe_histogram!(
        "agent_task_duration_seconds",
        "Duration of completed agent tasks in seconds"
    );

    info!("Metrics exporter listening on {}", addr);
}
