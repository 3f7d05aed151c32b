// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::domain::models::article::Article;
use crate::domain::models::lifecycle::Lifecycle;
use crate::domain::models::source::Source;
use crate::domain::models::watch_log::WatchLog;
use crate::domain::repositories::article_repository::{ArticleChangeSet, ArticleRepository};
use crate::domain::repositories::entity_repository::{EntityRepository, Visibility};
use crate::domain::repositories::source_repository::SourceRepository;
use crate::domain::repositories::watch_log_repository::WatchLogRepository;
use crate::utils::errors::RepositoryError;

/// 检查存储中的版本并返回 `version + 1` 的副本
fn bump_version<E: Lifecycle>(stored: Option<&E>, entity: &E) -> Result<E, RepositoryError> {
    let stored = stored.ok_or(RepositoryError::NotFound)?;
    if stored.meta().version != entity.meta().version {
        return Err(RepositoryError::Conflict);
    }
    let mut saved = entity.clone();
    saved.meta_mut().version += 1;
    Ok(saved)
}

fn sorted_by_creation<E: Lifecycle>(mut entities: Vec<E>) -> Vec<E> {
    entities.sort_by_key(|entity| (entity.meta().created_at, entity.id()));
    entities
}

/// 内存来源仓库
///
/// 与数据库实现遵循相同的约定（存活定位符唯一、条件更新），用于测试与本地运行。
#[derive(Default)]
pub struct InMemorySourceRepository {
    sources: RwLock<HashMap<Uuid, Source>>,
    unavailable: AtomicBool,
}

impl InMemorySourceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟存储不可用，之后的所有调用返回 `RepositoryError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "source store is unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

fn live_uri_taken(sources: &HashMap<Uuid, Source>, candidate: &Source) -> bool {
    candidate.is_live()
        && sources
            .values()
            .any(|s| s.id() != candidate.id() && s.is_live() && s.uri == candidate.uri)
}

#[async_trait]
impl EntityRepository<Source> for InMemorySourceRepository {
    async fn insert(&self, entity: &Source) -> Result<Source, RepositoryError> {
        self.ensure_available()?;
        let mut sources = self.sources.write();
        if sources.contains_key(&entity.id()) || live_uri_taken(&sources, entity) {
            return Err(RepositoryError::AlreadyExists);
        }
        sources.insert(entity.id(), entity.clone());
        Ok(entity.clone())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        visibility: Visibility,
    ) -> Result<Option<Source>, RepositoryError> {
        self.ensure_available()?;
        Ok(self
            .sources
            .read()
            .get(&id)
            .filter(|source| visibility.admits(*source))
            .cloned())
    }

    async fn list(&self, visibility: Visibility) -> Result<Vec<Source>, RepositoryError> {
        self.ensure_available()?;
        let sources = self
            .sources
            .read()
            .values()
            .filter(|source| visibility.admits(*source))
            .cloned()
            .collect();
        Ok(sorted_by_creation(sources))
    }

    async fn update_if_version(&self, entity: &Source) -> Result<Source, RepositoryError> {
        self.ensure_available()?;
        let mut sources = self.sources.write();
        let saved = bump_version(sources.get(&entity.id()), entity)?;
        if live_uri_taken(&sources, &saved) {
            return Err(RepositoryError::AlreadyExists);
        }
        sources.insert(saved.id(), saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl SourceRepository for InMemorySourceRepository {
    async fn find_live_by_uri(&self, uri: &str) -> Result<Option<Source>, RepositoryError> {
        self.ensure_available()?;
        Ok(self
            .sources
            .read()
            .values()
            .find(|source| source.is_live() && source.uri == uri)
            .cloned())
    }

    async fn due_sources(
        &self,
        now: DateTime<Utc>,
        limit: u64,
        exclude: &[Uuid],
    ) -> Result<Vec<Source>, RepositoryError> {
        self.ensure_available()?;
        let mut due: Vec<Source> = self
            .sources
            .read()
            .values()
            .filter(|source| source.is_due(now) && !exclude.contains(&source.id()))
            .cloned()
            .collect();
        due.sort_by_key(|source| (source.next_due_at, source.meta.created_at, source.id()));
        due.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(due)
    }
}

/// 内存内容仓库，同时保存检查历史
#[derive(Default)]
pub struct InMemoryContentRepository {
    articles: RwLock<HashMap<Uuid, Article>>,
    watch_logs: RwLock<Vec<WatchLog>>,
    unavailable: AtomicBool,
}

impl InMemoryContentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "content store is unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityRepository<Article> for InMemoryContentRepository {
    async fn insert(&self, entity: &Article) -> Result<Article, RepositoryError> {
        self.ensure_available()?;
        let mut articles = self.articles.write();
        if articles.contains_key(&entity.id()) {
            return Err(RepositoryError::AlreadyExists);
        }
        articles.insert(entity.id(), entity.clone());
        Ok(entity.clone())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        visibility: Visibility,
    ) -> Result<Option<Article>, RepositoryError> {
        self.ensure_available()?;
        Ok(self
            .articles
            .read()
            .get(&id)
            .filter(|article| visibility.admits(*article))
            .cloned())
    }

    async fn list(&self, visibility: Visibility) -> Result<Vec<Article>, RepositoryError> {
        self.ensure_available()?;
        let articles = self
            .articles
            .read()
            .values()
            .filter(|article| visibility.admits(*article))
            .cloned()
            .collect();
        Ok(sorted_by_creation(articles))
    }

    async fn update_if_version(&self, entity: &Article) -> Result<Article, RepositoryError> {
        self.ensure_available()?;
        let mut articles = self.articles.write();
        let saved = bump_version(articles.get(&entity.id()), entity)?;
        articles.insert(saved.id(), saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl ArticleRepository for InMemoryContentRepository {
    async fn list_for_source(
        &self,
        source_id: Uuid,
        visibility: Visibility,
    ) -> Result<Vec<Article>, RepositoryError> {
        self.ensure_available()?;
        let articles = self
            .articles
            .read()
            .values()
            .filter(|article| article.source_id == source_id && visibility.admits(*article))
            .cloned()
            .collect();
        Ok(sorted_by_creation(articles))
    }

    async fn commit_changes(&self, changes: &ArticleChangeSet) -> Result<(), RepositoryError> {
        self.ensure_available()?;
        let mut articles = self.articles.write();
        let mut watch_logs = self.watch_logs.write();

        // 先全部校验，再统一写入
        for article in &changes.created {
            if articles.contains_key(&article.id()) {
                return Err(RepositoryError::AlreadyExists);
            }
        }
        let mut updated = Vec::with_capacity(changes.changed.len());
        for article in &changes.changed {
            updated.push(bump_version(articles.get(&article.id()), article)?);
        }
        if let Some(log) = &changes.watch_log {
            if watch_logs.iter().any(|existing| existing.id() == log.id()) {
                return Err(RepositoryError::AlreadyExists);
            }
        }

        for article in changes.created.iter().cloned().chain(updated) {
            articles.insert(article.id(), article);
        }
        if let Some(log) = &changes.watch_log {
            watch_logs.push(log.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl WatchLogRepository for InMemoryContentRepository {
    async fn latest_for_source(&self, source_id: Uuid) -> Result<Option<WatchLog>, RepositoryError> {
        self.ensure_available()?;
        Ok(self
            .watch_logs
            .read()
            .iter()
            .filter(|log| log.source_id == source_id && log.is_live())
            .max_by_key(|log| (log.meta.created_at, log.id()))
            .cloned())
    }

    async fn list_for_source(&self, source_id: Uuid) -> Result<Vec<WatchLog>, RepositoryError> {
        self.ensure_available()?;
        let mut logs: Vec<WatchLog> = self
            .watch_logs
            .read()
            .iter()
            .filter(|log| log.source_id == source_id && log.is_live())
            .cloned()
            .collect();
        logs.sort_by(|a, b| (b.meta.created_at, b.id()).cmp(&(a.meta.created_at, a.id())));
        Ok(logs)
    }
}
