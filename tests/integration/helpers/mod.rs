// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod checkers;

use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use puteus::checkers::registry::CheckerRegistry;
use puteus::checkers::traits::SourceChecker;
use puteus::config::settings::{DatabaseSettings, SchedulerConfig};
use puteus::domain::models::source::SourceType;
use puteus::domain::services::result_applier::ResultApplier;
use puteus::domain::services::source_registry::{RegistryPolicy, SourceRegistry};
use puteus::infrastructure::database::connection;
use puteus::infrastructure::observability::events::RecordingEventSink;
use puteus::infrastructure::repositories::memory_repo::{
    InMemoryContentRepository, InMemorySourceRepository,
};
use puteus::queue::scheduler::{SchedulerComponents, WatchScheduler};
use puteus::utils::clock::Clock;
use puteus::workers::check_executor::CheckExecutor;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;

/// 跟随 tokio 虚拟时间前进的时钟，配合 `start_paused` 使用
pub struct TokioClock {
    base: DateTime<Utc>,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            base: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
            start: tokio::time::Instant::now(),
        }
    }

    pub fn base(&self) -> DateTime<Utc> {
        self.base
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.start.elapsed()).unwrap();
        (self.base + elapsed).trunc_subsecs(6)
    }
}

/// 基于内存仓库组装的调度器
#[allow(dead_code)]
pub struct TestScheduler {
    pub scheduler: WatchScheduler,
    pub registry: Arc<SourceRegistry>,
    pub sources: Arc<InMemorySourceRepository>,
    pub content: Arc<InMemoryContentRepository>,
    pub events: Arc<RecordingEventSink>,
    pub clock: Arc<TokioClock>,
}

pub fn test_config() -> SchedulerConfig {
    SchedulerConfig {
        poll_interval: Duration::from_secs(5),
        max_concurrency: 4,
        check_timeout: Duration::from_secs(30),
        max_retry_attempts: 1,
        retry_base_delay: Duration::from_millis(100),
        max_backoff: Duration::from_secs(3600),
        degraded_failure_threshold: 5,
        drain_grace: Duration::from_secs(5),
        batch_limit: 100,
        min_check_interval: Duration::from_secs(10),
        default_check_interval: Duration::from_secs(300),
    }
}

pub fn build_scheduler(config: SchedulerConfig, checker: Arc<dyn SourceChecker>) -> TestScheduler {
    let clock = Arc::new(TokioClock::new());
    let events = Arc::new(RecordingEventSink::new());
    let sources = Arc::new(InMemorySourceRepository::new());
    let content = Arc::new(InMemoryContentRepository::new());

    let registry = Arc::new(SourceRegistry::new(
        sources.clone(),
        RegistryPolicy::from(&config),
        clock.clone(),
        events.clone(),
    ));
    let applier = Arc::new(ResultApplier::new(
        content.clone(),
        content.clone(),
        clock.clone(),
        events.clone(),
    ));
    let checkers = CheckerRegistry::new().register(SourceType::Page, checker);
    let executor = Arc::new(CheckExecutor::from_config(checkers, &config));

    let scheduler = WatchScheduler::new(
        config,
        SchedulerComponents {
            registry: registry.clone(),
            executor,
            applier,
            clock: clock.clone(),
        },
    );

    TestScheduler {
        scheduler,
        registry,
        sources,
        content,
        events,
        clock,
    }
}

/// 内存 SQLite 数据库，已执行迁移
#[allow(dead_code)]
pub async fn sqlite_db() -> Arc<DatabaseConnection> {
    let settings = DatabaseSettings {
        url: "sqlite::memory:".to_string(),
        max_connections: Some(1),
        min_connections: Some(1),
        connect_timeout: Some(5),
        idle_timeout: None,
    };
    Arc::new(connection::connect_and_migrate(&settings).await.unwrap())
}
