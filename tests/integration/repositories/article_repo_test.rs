// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::helpers::sqlite_db;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use puteus::domain::models::article::Article;
use puteus::domain::models::check_outcome::DiscoveredItem;
use puteus::domain::models::lifecycle::{EntityMeta, Lifecycle};
use puteus::domain::models::watch_log::WatchLog;
use puteus::domain::repositories::article_repository::{ArticleChangeSet, ArticleRepository};
use puteus::domain::repositories::entity_repository::{EntityRepository, Visibility};
use puteus::domain::repositories::watch_log_repository::WatchLogRepository;
use puteus::infrastructure::repositories::article_repo_impl::ArticleRepositoryImpl;
use puteus::utils::errors::RepositoryError;
use uuid::Uuid;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap() + ChronoDuration::seconds(secs)
}

fn article(source_id: Uuid, key: &str, at: i64) -> Article {
    let item = DiscoveredItem::new(key, format!("https://example.com/{}", key)).with_title(key);
    Article::from_item(EntityMeta::new(t(at)), source_id, &item)
}

fn watch_log(source_id: Uuid, previous_id: Option<Uuid>, hash: &str, at: i64) -> WatchLog {
    WatchLog {
        meta: EntityMeta::new(t(at)),
        source_id,
        previous_id,
        content_hash: hash.to_string(),
        items_created: 1,
        items_updated: 0,
        items_vanished: 0,
    }
}

async fn repo() -> ArticleRepositoryImpl {
    ArticleRepositoryImpl::new(sqlite_db().await)
}

#[tokio::test]
async fn test_commit_writes_articles_and_log_together() {
    let repo = repo().await;
    let source_id = Uuid::new_v4();
    let log = watch_log(source_id, None, "h1", 0);

    repo.commit_changes(&ArticleChangeSet {
        created: vec![article(source_id, "a", 0), article(source_id, "b", 1)],
        changed: vec![],
        watch_log: Some(log.clone()),
    })
    .await
    .unwrap();

    let articles = ArticleRepository::list_for_source(&repo, source_id, Visibility::LiveOnly)
        .await
        .unwrap();
    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].natural_key, "a");

    let latest = repo.latest_for_source(source_id).await.unwrap().unwrap();
    assert_eq!(latest.meta.id, log.meta.id);
    assert_eq!(latest.content_hash, "h1");

    let other = ArticleRepository::list_for_source(&repo, Uuid::new_v4(), Visibility::LiveOnly)
        .await
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn test_stale_change_rolls_back_whole_commit() {
    let repo = repo().await;
    let source_id = Uuid::new_v4();
    let existing = repo.insert(&article(source_id, "a", 0)).await.unwrap();

    // 其他写入者先更新了该条目
    let mut concurrent = existing.clone();
    concurrent.title = "edited elsewhere".to_string();
    concurrent.touch(t(5));
    repo.update_if_version(&concurrent).await.unwrap();

    let mut stale = existing.clone();
    stale.mark_deleted(t(10));

    let result = repo
        .commit_changes(&ArticleChangeSet {
            created: vec![article(source_id, "b", 10)],
            changed: vec![stale],
            watch_log: Some(watch_log(source_id, None, "h2", 10)),
        })
        .await;
    assert!(matches!(result, Err(RepositoryError::Conflict)));

    let articles = ArticleRepository::list_for_source(&repo, source_id, Visibility::IncludeDeleted)
        .await
        .unwrap();
    assert_eq!(articles.len(), 1);
    assert!(articles[0].is_live());
    assert_eq!(articles[0].title, "edited elsewhere");
    assert!(repo.latest_for_source(source_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_watch_logs_are_listed_newest_first() {
    let repo = repo().await;
    let source_id = Uuid::new_v4();
    let first = watch_log(source_id, None, "h1", 0);
    let second = watch_log(source_id, Some(first.meta.id), "h2", 60);

    for log in [&first, &second] {
        repo.commit_changes(&ArticleChangeSet {
            created: vec![],
            changed: vec![],
            watch_log: Some(log.clone()),
        })
        .await
        .unwrap();
    }

    let latest = repo.latest_for_source(source_id).await.unwrap().unwrap();
    assert_eq!(latest.meta.id, second.meta.id);
    assert_eq!(latest.previous_id, Some(first.meta.id));

    let logs = WatchLogRepository::list_for_source(&repo, source_id).await.unwrap();
    let hashes: Vec<_> = logs.iter().map(|log| log.content_hash.as_str()).collect();
    assert_eq!(hashes, vec!["h2", "h1"]);
}

#[tokio::test]
async fn test_soft_deleted_article_restores_with_same_id() {
    let repo = repo().await;
    let source_id = Uuid::new_v4();
    let stored = repo.insert(&article(source_id, "a", 0)).await.unwrap();

    let mut deleted = stored.clone();
    deleted.mark_deleted(t(10));
    let deleted = repo.update_if_version(&deleted).await.unwrap();
    assert!(repo
        .find_by_id(stored.id(), Visibility::LiveOnly)
        .await
        .unwrap()
        .is_none());

    let mut restored = deleted.clone();
    restored.mark_restored(t(20));
    repo.update_if_version(&restored).await.unwrap();

    let loaded = repo
        .find_by_id(stored.id(), Visibility::LiveOnly)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.meta.version, 2);
    assert_eq!(loaded.meta.created_at, stored.meta.created_at);
    assert!(loaded.meta.updated_at > deleted.meta.updated_at);
}

#[tokio::test]
async fn test_latest_log_is_deterministic_for_equal_timestamps() {
    let repo = repo().await;
    let source_id = Uuid::new_v4();
    let first = watch_log(source_id, None, "h1", 0);
    let second = watch_log(source_id, None, "h2", 0);

    for log in [&first, &second] {
        repo.commit_changes(&ArticleChangeSet {
            created: vec![],
            changed: vec![],
            watch_log: Some(log.clone()),
        })
        .await
        .unwrap();
    }

    let expected = first.meta.id.max(second.meta.id);
    for _ in 0..3 {
        let latest = repo.latest_for_source(source_id).await.unwrap().unwrap();
        assert_eq!(latest.meta.id, expected);
    }
    let logs = WatchLogRepository::list_for_source(&repo, source_id).await.unwrap();
    assert_eq!(logs[0].meta.id, expected);
}
