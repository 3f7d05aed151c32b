// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::helpers::sqlite_db;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use puteus::domain::models::lifecycle::{EntityMeta, Lifecycle};
use puteus::domain::models::source::{Source, SourceType};
use puteus::domain::repositories::entity_repository::{EntityRepository, Visibility};
use puteus::domain::repositories::source_repository::SourceRepository;
use puteus::infrastructure::repositories::source_repo_impl::SourceRepositoryImpl;
use puteus::utils::errors::RepositoryError;
use std::time::Duration;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap() + ChronoDuration::seconds(secs)
}

fn source(uri: &str, created: i64, due: i64) -> Source {
    let mut source = Source::new(
        EntityMeta::new(t(created)),
        uri,
        SourceType::Page,
        Duration::from_secs(60),
    );
    source.next_due_at = t(due);
    source
}

async fn repo() -> SourceRepositoryImpl {
    SourceRepositoryImpl::new(sqlite_db().await)
}

#[tokio::test]
async fn test_due_sources_ordering_and_filters() {
    let repo = repo().await;

    let late = repo.insert(&source("https://a.example", 0, 30)).await.unwrap();
    let early = repo.insert(&source("https://b.example", 1, 10)).await.unwrap();
    let tie_second = repo.insert(&source("https://c.example", 3, 20)).await.unwrap();
    let tie_first = repo.insert(&source("https://d.example", 2, 20)).await.unwrap();
    repo.insert(&source("https://future.example", 0, 500)).await.unwrap();

    let mut deleted = source("https://gone.example", 0, 5);
    deleted.mark_deleted(t(6));
    repo.insert(&deleted).await.unwrap();

    let due = repo.due_sources(t(100), 10, &[]).await.unwrap();
    let ids: Vec<_> = due.iter().map(|s| s.id()).collect();
    assert_eq!(
        ids,
        vec![early.id(), tie_first.id(), tie_second.id(), late.id()]
    );

    let limited = repo.due_sources(t(100), 2, &[]).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].id(), early.id());

    let excluded = repo
        .due_sources(t(100), 10, &[early.id(), tie_first.id()])
        .await
        .unwrap();
    let ids: Vec<_> = excluded.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec![tie_second.id(), late.id()]);

    let boundary = repo.due_sources(t(10), 10, &[]).await.unwrap();
    assert_eq!(boundary.len(), 1);
    assert_eq!(boundary[0].id(), early.id());
}

#[tokio::test]
async fn test_conditional_update_detects_stale_version() {
    let repo = repo().await;
    let stored = repo.insert(&source("https://a.example", 0, 0)).await.unwrap();

    let mut fresh = stored.clone();
    fresh.consecutive_failures = 1;
    fresh.touch(t(10));
    let fresh = repo.update_if_version(&fresh).await.unwrap();
    assert_eq!(fresh.meta.version, 1);

    let mut stale = stored.clone();
    stale.consecutive_failures = 7;
    let result = repo.update_if_version(&stale).await;
    assert!(matches!(result, Err(RepositoryError::Conflict)));

    let reloaded = repo
        .find_by_id(stored.id(), Visibility::LiveOnly)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.consecutive_failures, 1);
    assert_eq!(reloaded.meta.version, 1);

    let missing = source("https://missing.example", 0, 0);
    let result = repo.update_if_version(&missing).await;
    assert!(matches!(result, Err(RepositoryError::NotFound)));
}

#[tokio::test]
async fn test_live_uri_is_unique_until_soft_deleted() {
    let repo = repo().await;
    let first = repo.insert(&source("https://a.example", 0, 0)).await.unwrap();

    let duplicate = repo.insert(&source("https://a.example", 1, 0)).await;
    assert!(matches!(duplicate, Err(RepositoryError::AlreadyExists)));

    let mut deleted = first.clone();
    deleted.mark_deleted(t(5));
    repo.update_if_version(&deleted).await.unwrap();

    assert!(repo.find_live_by_uri("https://a.example").await.unwrap().is_none());
    let second = repo.insert(&source("https://a.example", 10, 0)).await.unwrap();
    let live = repo.find_live_by_uri("https://a.example").await.unwrap().unwrap();
    assert_eq!(live.id(), second.id());

    let hidden = repo.find_by_id(first.id(), Visibility::LiveOnly).await.unwrap();
    assert!(hidden.is_none());
    let visible = repo
        .find_by_id(first.id(), Visibility::IncludeDeleted)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(visible.meta.deleted_at, Some(t(5)));

    assert_eq!(repo.list(Visibility::LiveOnly).await.unwrap().len(), 1);
    assert_eq!(repo.list(Visibility::IncludeDeleted).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_scheduling_fields_roundtrip_with_microseconds() {
    let repo = repo().await;
    let mut original = source("https://a.example", 0, 0);
    original.meta.created_at = t(0) + ChronoDuration::microseconds(123_456);
    original.meta.updated_at = original.meta.created_at;
    original.next_due_at = t(120) + ChronoDuration::microseconds(7);
    original.last_checked_at = Some(t(60) + ChronoDuration::microseconds(999_999));
    original.consecutive_failures = 3;
    original.degraded = true;
    original.last_error = Some("Transient failure: reset".to_string());
    original.check_interval = Duration::from_secs(900);
    original.source_type = SourceType::Rss;

    repo.insert(&original).await.unwrap();
    let loaded = repo
        .find_by_id(original.id(), Visibility::LiveOnly)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(loaded, original);
}
