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

use puteus::checkers::http_checker::HttpPageChecker;
use puteus::checkers::registry::CheckerRegistry;
use puteus::config::settings::Settings;
use puteus::domain::events::EventSink;
use puteus::domain::models::source::SourceType;
use puteus::domain::services::result_applier::ResultApplier;
use puteus::domain::services::source_registry::{RegistryPolicy, SourceRegistry};
use puteus::infrastructure::database::connection;
use puteus::infrastructure::observability::events::{
    FanoutEventSink, MetricsEventSink, TracingEventSink,
};
use puteus::infrastructure::repositories::article_repo_impl::ArticleRepositoryImpl;
use puteus::infrastructure::repositories::source_repo_impl::SourceRepositoryImpl;
use puteus::queue::scheduler::{SchedulerComponents, WatchScheduler};
use puteus::utils::clock::{Clock, SystemClock};
use puteus::utils::telemetry;
use puteus::workers::check_executor::CheckExecutor;
use std::sync::Arc;
use tracing::{error, info};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并运行调度器直到收到停机信号
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let settings = Settings::new()?;

    // 2. Initialize logging and metrics
    telemetry::init_telemetry(settings.telemetry.json);
    info!("Starting puteus...");
    if let Some(addr) = &settings.telemetry.metrics_addr {
        puteus::infrastructure::metrics::init_metrics(addr);
    }

    // 3. Connect to database and run migrations
    let db = Arc::new(connection::connect_and_migrate(&settings.database).await?);
    info!("Database connection established");

    // 4. Initialize components
    let scheduler_config = settings.scheduler.to_config();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let events: Arc<dyn EventSink> = Arc::new(
        FanoutEventSink::new()
            .with(Arc::new(TracingEventSink))
            .with(Arc::new(MetricsEventSink)),
    );

    let source_repo = Arc::new(SourceRepositoryImpl::new(db.clone()));
    let content_repo = Arc::new(ArticleRepositoryImpl::new(db.clone()));

    let registry = Arc::new(SourceRegistry::new(
        source_repo,
        RegistryPolicy::from(&scheduler_config),
        clock.clone(),
        events.clone(),
    ));
    let applier = Arc::new(ResultApplier::new(
        content_repo.clone(),
        content_repo,
        clock.clone(),
        events,
    ));

    let page_checker = Arc::new(HttpPageChecker::new(&settings.checker)?);
    let checkers = CheckerRegistry::new()
        .register(SourceType::Page, page_checker.clone())
        .register(SourceType::Rss, page_checker);
    let executor = Arc::new(CheckExecutor::from_config(checkers, &scheduler_config));

    // 5. Start scheduler
    let scheduler = WatchScheduler::new(
        scheduler_config,
        SchedulerComponents {
            registry,
            executor,
            applier,
            clock,
        },
    );
    scheduler.start()?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            scheduler.shutdown().await?;
        }
        result = scheduler.wait() => {
            result?;
        }
    }

    info!("puteus stopped");
    Ok(())
}
