// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::events::{EventSink, LifecycleEvent};
use crate::domain::models::article::Article;
use crate::domain::models::check_outcome::{CheckOutcome, DiscoveredItem, PreviousState};
use crate::domain::models::lifecycle::{next_stamp, EntityKind, EntityMeta, Lifecycle};
use crate::domain::models::source::Source;
use crate::domain::models::watch_log::WatchLog;
use crate::domain::repositories::article_repository::{ArticleChangeSet, ArticleRepository};
use crate::domain::repositories::entity_repository::Visibility;
use crate::domain::repositories::watch_log_repository::WatchLogRepository;
use crate::utils::clock::Clock;
use crate::utils::errors::{DomainError, RepositoryError};

const MAX_APPLY_ATTEMPTS: u32 = 3;

/// 一次协调的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: u32,
    pub updated: u32,
    pub restored: u32,
    pub vanished: u32,
    /// 条目集合与上一次记录一致，未做任何写入
    pub unchanged: bool,
    pub watch_log_id: Option<Uuid>,
}

/// 检查结果协调器
///
/// 把成功检查发现的条目与该来源已有的内容对齐：新键创建，
/// 变化的键更新，重新出现的键恢复，消失的键软删除。
/// 整个变更集与检查历史在一次提交中落库。失败的检查不产生任何写入。
pub struct ResultApplier {
    articles: Arc<dyn ArticleRepository>,
    watch_logs: Arc<dyn WatchLogRepository>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl ResultApplier {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        watch_logs: Arc<dyn WatchLogRepository>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            articles,
            watch_logs,
            clock,
            events,
        }
    }

    /// 应用一次检查结果
    pub async fn apply(
        &self,
        source: &Source,
        outcome: &CheckOutcome,
    ) -> Result<ApplySummary, DomainError> {
        let items = match outcome {
            CheckOutcome::Success { items } => items,
            _ => return Ok(ApplySummary::default()),
        };

        let mut attempt = 1;
        loop {
            match self.reconcile(source, items).await {
                Err(DomainError::Conflict(id)) if attempt < MAX_APPLY_ATTEMPTS => {
                    debug!(source_id = %id, attempt, "Content changed concurrently, reconciling again");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// 上一次记录的检查状态，供检查器做增量判断
    pub async fn previous_state(&self, source_id: Uuid) -> Result<Option<PreviousState>, DomainError> {
        Ok(self
            .watch_logs
            .latest_for_source(source_id)
            .await?
            .map(|log| PreviousState {
                content_hash: log.content_hash,
                recorded_at: log.meta.created_at,
            }))
    }

    #[instrument(skip_all, fields(source_id = %source.id()))]
    async fn reconcile(
        &self,
        source: &Source,
        items: &[DiscoveredItem],
    ) -> Result<ApplySummary, DomainError> {
        let items = distinct_items(items);
        let digest = content_digest(&items);

        let latest = self.watch_logs.latest_for_source(source.id()).await?;
        if latest.as_ref().is_some_and(|log| log.content_hash == digest) {
            debug!("Discovered items unchanged since last check");
            return Ok(ApplySummary {
                unchanged: true,
                ..ApplySummary::default()
            });
        }

        let now = self.clock.now();
        let existing = self
            .articles
            .list_for_source(source.id(), Visibility::IncludeDeleted)
            .await?;

        // 同一键存在多条记录时优先存活、其次最近更新的一条
        let mut by_key: HashMap<&str, &Article> = HashMap::new();
        for article in &existing {
            let key = article.natural_key.as_str();
            let preferred = by_key.get(key).map_or(true, |current| {
                (article.is_live(), article.meta.updated_at)
                    > (current.is_live(), current.meta.updated_at)
            });
            if preferred {
                by_key.insert(key, article);
            }
        }

        let mut summary = ApplySummary::default();
        let mut changes = ArticleChangeSet::default();
        let mut events = Vec::new();
        let mut seen = HashSet::new();

        for item in &items {
            seen.insert(item.natural_key.as_str());
            match by_key.get(item.natural_key.as_str()) {
                None => {
                    let article = Article::from_item(EntityMeta::new(now), source.id(), item);
                    events.push(LifecycleEvent::EntityCreated {
                        kind: EntityKind::Article,
                        entity_id: article.id(),
                    });
                    summary.created += 1;
                    changes.created.push(article);
                }
                Some(current) if current.is_live() => {
                    if !current.differs_from(item) {
                        continue;
                    }
                    let mut article = (*current).clone();
                    article.apply_item(item);
                    article.touch(now);
                    events.push(LifecycleEvent::EntityUpdated {
                        kind: EntityKind::Article,
                        entity_id: article.id(),
                    });
                    summary.updated += 1;
                    changes.changed.push(article);
                }
                Some(current) => {
                    let mut article = (*current).clone();
                    article.apply_item(item);
                    article.mark_restored(now);
                    events.push(LifecycleEvent::EntityRestored {
                        kind: EntityKind::Article,
                        entity_id: article.id(),
                    });
                    summary.restored += 1;
                    changes.changed.push(article);
                }
            }
        }

        for article in existing
            .iter()
            .filter(|article| article.is_live() && !seen.contains(article.natural_key.as_str()))
        {
            let mut vanished = article.clone();
            vanished.mark_deleted(now);
            events.push(LifecycleEvent::EntitySoftDeleted {
                kind: EntityKind::Article,
                entity_id: vanished.id(),
            });
            summary.vanished += 1;
            changes.changed.push(vanished);
        }

        // 日志链上的创建时间严格递增，`latest_for_source` 才能唯一确定链头
        let log_stamp = latest
            .as_ref()
            .map_or(now, |log| next_stamp(log.meta.created_at, now));
        let log = WatchLog {
            meta: EntityMeta::new(log_stamp),
            source_id: source.id(),
            previous_id: latest.as_ref().map(|log| log.id()),
            content_hash: digest,
            items_created: summary.created,
            items_updated: summary.updated + summary.restored,
            items_vanished: summary.vanished,
        };
        summary.watch_log_id = Some(log.id());
        events.push(LifecycleEvent::EntityCreated {
            kind: EntityKind::WatchLog,
            entity_id: log.id(),
        });
        changes.watch_log = Some(log);

        match self.articles.commit_changes(&changes).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict) => return Err(DomainError::Conflict(source.id())),
            Err(e) => return Err(e.into()),
        }

        for event in &events {
            self.events.emit(event);
        }

        info!(
            created = summary.created,
            updated = summary.updated,
            restored = summary.restored,
            vanished = summary.vanished,
            "Check result applied"
        );
        Ok(summary)
    }
}

/// 去除无效与重复的条目，同一键保留第一次出现的条目
fn distinct_items(items: &[DiscoveredItem]) -> Vec<&DiscoveredItem> {
    let mut keys = HashSet::new();
    items
        .iter()
        .filter(|item| {
            if item.natural_key.trim().is_empty() {
                warn!(uri = %item.uri, "Discarding discovered item without a natural key");
                return false;
            }
            keys.insert(item.natural_key.as_str())
        })
        .collect()
}

/// 条目集合摘要，与条目顺序无关
pub fn content_digest(items: &[&DiscoveredItem]) -> String {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| a.natural_key.cmp(&b.natural_key));

    let mut hasher = Sha256::new();
    for item in sorted {
        for field in [
            Some(item.natural_key.as_str()),
            Some(item.uri.as_str()),
            item.title.as_deref(),
            item.description.as_deref(),
            item.content_hash.as_deref(),
        ] {
            match field {
                Some(value) => {
                    hasher.update([1u8]);
                    hasher.update((value.len() as u64).to_le_bytes());
                    hasher.update(value.as_bytes());
                }
                None => hasher.update([0u8]),
            }
        }
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[path = "result_applier_test.rs"]
mod tests;
