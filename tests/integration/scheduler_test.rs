// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::helpers::checkers::{ConcurrencyTracker, HangingChecker, SequenceChecker};
use crate::integration::helpers::{build_scheduler, test_config};
use chrono::Duration as ChronoDuration;
use puteus::domain::events::LifecycleEvent;
use puteus::domain::models::check_outcome::{CheckOutcome, DiscoveredItem, OutcomeKind};
use puteus::domain::models::lifecycle::Lifecycle;
use puteus::domain::models::source::SourceType;
use puteus::domain::repositories::article_repository::ArticleRepository;
use puteus::domain::repositories::entity_repository::Visibility;
use puteus::queue::scheduler::{SchedulerError, SchedulerState};
use puteus::utils::errors::DomainError;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn item(key: &str) -> DiscoveredItem {
    DiscoveredItem::new(key, format!("https://example.com/{}", key)).with_title(key)
}

#[tokio::test(start_paused = true)]
async fn test_failure_backs_off_then_success_resets_schedule() {
    let checker = Arc::new(SequenceChecker::new(vec![
        Err("connection reset".to_string()),
        Ok(vec![item("a"), item("b")]),
    ]));
    let mut config = test_config();
    config.poll_interval = Duration::from_secs(5);
    let harness = build_scheduler(config, checker.clone());
    let t0 = harness.clock.base();

    let source = harness
        .registry
        .register("https://example.com/feed", SourceType::Page, Duration::from_secs(60))
        .await
        .unwrap();

    harness.scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let after_failure = harness.registry.get(source.id()).await.unwrap().unwrap();
    assert_eq!(after_failure.consecutive_failures, 1);
    assert_eq!(after_failure.next_due_at, t0 + ChronoDuration::seconds(120));
    assert_eq!(after_failure.last_checked_at, None);
    assert_eq!(
        after_failure.last_error.as_deref(),
        Some("Transient failure: connection reset")
    );

    tokio::time::sleep(Duration::from_secs(124)).await;

    let after_success = harness.registry.get(source.id()).await.unwrap().unwrap();
    assert_eq!(after_success.consecutive_failures, 0);
    let last_checked = after_success.last_checked_at.unwrap();
    assert_eq!(
        after_success.next_due_at - last_checked,
        ChronoDuration::seconds(60)
    );
    assert_eq!(checker.calls(), 2);

    let articles = harness
        .content
        .list_for_source(source.id(), Visibility::LiveOnly)
        .await
        .unwrap();
    assert_eq!(articles.len(), 2);

    harness.scheduler.shutdown().await.unwrap();
    assert_eq!(harness.scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_hanging_checks_after_grace() {
    let checker = Arc::new(HangingChecker::default());
    let mut config = test_config();
    config.drain_grace = Duration::from_secs(5);
    let harness = build_scheduler(config, checker.clone());

    let mut ids = Vec::new();
    for i in 0..3 {
        let source = harness
            .registry
            .register(
                &format!("https://example.com/slow-{}", i),
                SourceType::Page,
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        ids.push(source.id());
    }

    harness.scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(checker.calls(), 3);
    assert_eq!(harness.scheduler.in_flight().len(), 3);

    let started = tokio::time::Instant::now();
    harness.scheduler.shutdown().await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(5));
    assert!(elapsed < Duration::from_secs(6));
    assert_eq!(harness.scheduler.state(), SchedulerState::Stopped);
    assert!(harness.scheduler.in_flight().is_empty());

    let checked: Vec<_> = harness
        .events
        .named("source.checked")
        .into_iter()
        .filter(|event| {
            matches!(
                event,
                LifecycleEvent::SourceChecked {
                    outcome: OutcomeKind::TransientFailure,
                    ..
                }
            )
        })
        .collect();
    assert_eq!(checked.len(), 3);

    for id in ids {
        let source = harness.registry.get(id).await.unwrap().unwrap();
        assert_eq!(source.consecutive_failures, 1);
        assert_eq!(
            source.last_error.as_deref(),
            Some("check cancelled during shutdown")
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_repository_halts_scheduler() {
    let checker = Arc::new(SequenceChecker::default());
    let harness = build_scheduler(test_config(), checker.clone());
    harness.sources.set_unavailable(true);

    harness.scheduler.start().unwrap();
    let result = harness.scheduler.wait().await;

    match result {
        Err(SchedulerError::Fatal(e)) => assert!(e.is_infrastructure()),
        other => panic!("expected fatal error, got {:?}", other),
    }
    assert_eq!(harness.scheduler.state(), SchedulerState::Stopped);
    assert_eq!(checker.calls(), 0);

    // 运维恢复后可以重新启动
    harness.sources.set_unavailable(false);
    harness.scheduler.start().unwrap();
    harness.scheduler.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_limit_and_single_flight_per_source() {
    let tracker = Arc::new(ConcurrencyTracker::new(Duration::from_secs(15)));
    let mut config = test_config();
    config.max_concurrency = 3;
    config.poll_interval = Duration::from_secs(1);
    let harness = build_scheduler(config, tracker.clone());

    for i in 0..10 {
        harness
            .registry
            .register(
                &format!("https://example.com/busy-{}", i),
                SourceType::Page,
                Duration::from_secs(10),
            )
            .await
            .unwrap();
    }

    harness.scheduler.start().unwrap();
    for _ in 0..120 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(harness.scheduler.in_flight().len() <= 3);
    }
    harness.scheduler.shutdown().await.unwrap();

    assert!(tracker.max_running() <= 3);
    assert_eq!(tracker.max_running(), 3);
    assert_eq!(tracker.overlaps(), 0);
    assert!(tracker.completed() >= 15);
}

#[tokio::test(start_paused = true)]
async fn test_check_now_runs_a_full_cycle() {
    let checker = Arc::new(SequenceChecker::new(vec![Ok(vec![item("a")])]));
    let harness = build_scheduler(test_config(), checker.clone());
    let source = harness
        .registry
        .register("https://example.com/manual", SourceType::Page, Duration::from_secs(60))
        .await
        .unwrap();

    let outcome = harness.scheduler.check_now(source.id()).await.unwrap();
    assert!(matches!(outcome, Some(CheckOutcome::Success { ref items }) if items.len() == 1));

    let stored = harness.registry.get(source.id()).await.unwrap().unwrap();
    assert!(stored.last_checked_at.is_some());
    assert_eq!(stored.consecutive_failures, 0);
    assert!(harness.scheduler.in_flight().is_empty());

    let articles = harness
        .content
        .list_for_source(source.id(), Visibility::LiveOnly)
        .await
        .unwrap();
    assert_eq!(articles.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_check_now_unknown_source() {
    let harness = build_scheduler(test_config(), Arc::new(SequenceChecker::default()));
    let missing = Uuid::new_v4();

    let result = harness.scheduler.check_now(missing).await;
    match result {
        Err(SchedulerError::Domain(e)) => {
            assert!(matches!(*e, DomainError::NotFound(id) if id == missing))
        }
        other => panic!("expected not found, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_check_now_skips_source_in_flight() {
    let harness = build_scheduler(test_config(), Arc::new(HangingChecker::default()));
    let source = harness
        .registry
        .register("https://example.com/busy", SourceType::Page, Duration::from_secs(60))
        .await
        .unwrap();

    harness.scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let outcome = harness.scheduler.check_now(source.id()).await.unwrap();
    assert_eq!(outcome, None);

    harness.scheduler.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_is_rejected() {
    let harness = build_scheduler(test_config(), Arc::new(SequenceChecker::default()));

    harness.scheduler.start().unwrap();
    let second = harness.scheduler.start();
    assert!(matches!(
        second,
        Err(SchedulerError::InvalidState(SchedulerState::Running))
    ));

    harness.scheduler.shutdown().await.unwrap();
    assert_eq!(harness.scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_manual_check() {
    let mut config = test_config();
    config.poll_interval = Duration::from_secs(600);
    config.drain_grace = Duration::from_secs(5);
    let harness = build_scheduler(config, Arc::new(HangingChecker::default()));

    harness.scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    // 在两次轮询之间登记，只会被手动检查
    let source = harness
        .registry
        .register("https://example.com/manual", SourceType::Page, Duration::from_secs(60))
        .await
        .unwrap();

    let manual = harness.scheduler.check_now(source.id());
    let stop = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(harness.scheduler.in_flight(), vec![source.id()]);

        let started = tokio::time::Instant::now();
        harness.scheduler.shutdown().await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(harness.scheduler.state(), SchedulerState::Stopped);
        assert!(harness.scheduler.in_flight().is_empty());
        assert_eq!(harness.events.named("source.checked").len(), 1);
        elapsed
    };
    let (outcome, elapsed) = tokio::join!(manual, stop);

    assert!(elapsed >= Duration::from_secs(5));
    assert!(elapsed < Duration::from_secs(6));
    assert_eq!(
        outcome.unwrap(),
        Some(CheckOutcome::TransientFailure {
            reason: "check cancelled during shutdown".to_string(),
        })
    );

    let stored = harness.registry.get(source.id()).await.unwrap().unwrap();
    assert_eq!(stored.consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_check_now_rejected_while_draining() {
    let mut config = test_config();
    config.drain_grace = Duration::from_secs(5);
    let harness = build_scheduler(config, Arc::new(HangingChecker::default()));
    let source = harness
        .registry
        .register("https://example.com/slow", SourceType::Page, Duration::from_secs(60))
        .await
        .unwrap();

    harness.scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let manual = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(harness.scheduler.state(), SchedulerState::Draining);
        harness.scheduler.check_now(source.id()).await
    };
    let (stopped, manual) = tokio::join!(harness.scheduler.shutdown(), manual);

    stopped.unwrap();
    assert!(matches!(
        manual,
        Err(SchedulerError::InvalidState(SchedulerState::Draining))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_source_type_is_backed_off() {
    let checker = Arc::new(SequenceChecker::default());
    let harness = build_scheduler(test_config(), checker.clone());
    let t0 = harness.clock.base();

    let source = harness
        .registry
        .register("https://example.com/feed.xml", SourceType::Rss, Duration::from_secs(60))
        .await
        .unwrap();

    harness.scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    harness.scheduler.shutdown().await.unwrap();

    let stored = harness.registry.get(source.id()).await.unwrap().unwrap();
    assert_eq!(stored.consecutive_failures, 1);
    assert_eq!(stored.next_due_at, t0 + ChronoDuration::seconds(120));
    assert!(stored
        .last_error
        .as_deref()
        .unwrap()
        .starts_with("no checker registered"));
    assert_eq!(checker.calls(), 0);

    assert!(matches!(
        harness.events.named("source.checked").as_slice(),
        [LifecycleEvent::SourceChecked {
            outcome: OutcomeKind::PermanentFailure,
            ..
        }]
    ));
}
