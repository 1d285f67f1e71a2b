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

use agentrs::config::settings::Settings;
use agentrs::executors::llm_executor::LlmExecutor;
use agentrs::presentation::routes;
use agentrs::scheduler::background_manager::BackgroundManager;
use agentrs::scheduler::sweeper::StaleTaskSweeper;
use agentrs::utils::telemetry;
use axum::Extension;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting agentrs...");

    // Initialize Prometheus Metrics
    agentrs::infrastructure::metrics::init_metrics();

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    // 3. Initialize Executor
    let executor = Arc::new(LlmExecutor::new(&settings.executor));
    info!("Executor initialized");

    // 4. Initialize Background Manager and start the drain loop
    let manager = BackgroundManager::new(
        executor,
        settings.scheduler.clone(),
        &settings.concurrency,
    );
    manager.start();
    info!("Background manager started");

    // 5. Start the stale task sweeper
    let sweeper = StaleTaskSweeper::new(
        manager.clone(),
        Duration::from_secs(settings.scheduler.sweep_interval_secs),
    );
    sweeper.start();

    // 6. Start HTTP server
    let app = routes::routes()
        .layer(TraceLayer::new_for_http())
        .layer(Extension(manager))
        .layer(Extension(settings.clone()));

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
