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

use crate::domain::models::article::Article;
use crate::domain::models::lifecycle::{EntityMeta, Lifecycle};
use crate::domain::models::watch_log::WatchLog;
use crate::domain::repositories::article_repository::{ArticleChangeSet, ArticleRepository};
use crate::domain::repositories::entity_repository::{EntityRepository, Visibility};
use crate::domain::repositories::watch_log_repository::WatchLogRepository;
use crate::infrastructure::database::entities::{article as article_entity, watch_log as watch_log_entity};
use crate::infrastructure::repositories::map_write_error;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 内容与检查历史仓库实现
///
/// 两者共用一个连接，使一次结果协调可以在同一事务内提交
#[derive(Clone)]
pub struct ArticleRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl ArticleRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<article_entity::Model> for Article {
    fn from(model: article_entity::Model) -> Self {
        Self {
            meta: EntityMeta {
                id: model.id,
                version: model.version,
                created_at: model.created_at,
                updated_at: model.updated_at,
                deleted_at: model.deleted_at,
            },
            source_id: model.source_id,
            natural_key: model.natural_key,
            title: model.title,
            uri: model.uri,
            description: model.description,
            content_hash: model.content_hash,
        }
    }
}

impl From<&Article> for article_entity::ActiveModel {
    fn from(article: &Article) -> Self {
        Self {
            id: Set(article.meta.id),
            version: Set(article.meta.version),
            source_id: Set(article.source_id),
            natural_key: Set(article.natural_key.clone()),
            title: Set(article.title.clone()),
            uri: Set(article.uri.clone()),
            description: Set(article.description.clone()),
            content_hash: Set(article.content_hash.clone()),
            created_at: Set(article.meta.created_at),
            updated_at: Set(article.meta.updated_at),
            deleted_at: Set(article.meta.deleted_at),
        }
    }
}

impl From<watch_log_entity::Model> for WatchLog {
    fn from(model: watch_log_entity::Model) -> Self {
        Self {
            meta: EntityMeta {
                id: model.id,
                version: model.version,
                created_at: model.created_at,
                updated_at: model.updated_at,
                deleted_at: model.deleted_at,
            },
            source_id: model.source_id,
            previous_id: model.previous_id,
            content_hash: model.content_hash,
            items_created: u32::try_from(model.items_created).unwrap_or(0),
            items_updated: u32::try_from(model.items_updated).unwrap_or(0),
            items_vanished: u32::try_from(model.items_vanished).unwrap_or(0),
        }
    }
}

impl From<&WatchLog> for watch_log_entity::ActiveModel {
    fn from(log: &WatchLog) -> Self {
        Self {
            id: Set(log.meta.id),
            version: Set(log.meta.version),
            source_id: Set(log.source_id),
            previous_id: Set(log.previous_id),
            content_hash: Set(log.content_hash.clone()),
            items_created: Set(i32::try_from(log.items_created).unwrap_or(i32::MAX)),
            items_updated: Set(i32::try_from(log.items_updated).unwrap_or(i32::MAX)),
            items_vanished: Set(i32::try_from(log.items_vanished).unwrap_or(i32::MAX)),
            created_at: Set(log.meta.created_at),
            updated_at: Set(log.meta.updated_at),
            deleted_at: Set(log.meta.deleted_at),
        }
    }
}

fn visible(visibility: Visibility) -> Condition {
    match visibility {
        Visibility::LiveOnly => Condition::all().add(article_entity::Column::DeletedAt.is_null()),
        Visibility::IncludeDeleted => Condition::all(),
    }
}

/// 条件更新：仅当存储中的版本与 `article.meta.version` 一致时写入
async fn update_article<C: ConnectionTrait>(
    conn: &C,
    article: &Article,
) -> Result<Article, RepositoryError> {
    let expected = article.meta.version;
    let mut model: article_entity::ActiveModel = article.into();
    model.id = NotSet;
    model.created_at = NotSet;
    model.version = Set(expected + 1);

    let result = article_entity::Entity::update_many()
        .set(model)
        .filter(article_entity::Column::Id.eq(article.id()))
        .filter(article_entity::Column::Version.eq(expected))
        .exec(conn)
        .await
        .map_err(map_write_error)?;

    if result.rows_affected == 0 {
        let exists = article_entity::Entity::find_by_id(article.id())
            .count(conn)
            .await?
            > 0;
        return Err(if exists {
            RepositoryError::Conflict
        } else {
            RepositoryError::NotFound
        });
    }

    let mut saved = article.clone();
    saved.meta.version = expected + 1;
    Ok(saved)
}

#[async_trait]
impl EntityRepository<Article> for ArticleRepositoryImpl {
    async fn insert(&self, entity: &Article) -> Result<Article, RepositoryError> {
        let model: article_entity::ActiveModel = entity.into();
        model.insert(self.db.as_ref()).await.map_err(map_write_error)?;
        Ok(entity.clone())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        visibility: Visibility,
    ) -> Result<Option<Article>, RepositoryError> {
        let model = article_entity::Entity::find_by_id(id)
            .filter(visible(visibility))
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn list(&self, visibility: Visibility) -> Result<Vec<Article>, RepositoryError> {
        let models = article_entity::Entity::find()
            .filter(visible(visibility))
            .order_by_asc(article_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn update_if_version(&self, entity: &Article) -> Result<Article, RepositoryError> {
        update_article(self.db.as_ref(), entity).await
    }
}

#[async_trait]
impl ArticleRepository for ArticleRepositoryImpl {
    async fn list_for_source(
        &self,
        source_id: Uuid,
        visibility: Visibility,
    ) -> Result<Vec<Article>, RepositoryError> {
        let models = article_entity::Entity::find()
            .filter(article_entity::Column::SourceId.eq(source_id))
            .filter(visible(visibility))
            .order_by_asc(article_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn commit_changes(&self, changes: &ArticleChangeSet) -> Result<(), RepositoryError> {
        if changes.is_empty() {
            return Ok(());
        }

        // 未提交的事务在离开作用域时回滚
        let txn = self.db.begin().await?;

        for article in &changes.created {
            let model: article_entity::ActiveModel = article.into();
            model.insert(&txn).await.map_err(map_write_error)?;
        }

        for article in &changes.changed {
            update_article(&txn, article).await?;
        }

        if let Some(log) = &changes.watch_log {
            let model: watch_log_entity::ActiveModel = log.into();
            model.insert(&txn).await.map_err(map_write_error)?;
        }

        txn.commit().await?;
        debug!(
            created = changes.created.len(),
            changed = changes.changed.len(),
            "Committed article change set"
        );
        Ok(())
    }
}

#[async_trait]
impl WatchLogRepository for ArticleRepositoryImpl {
    async fn latest_for_source(&self, source_id: Uuid) -> Result<Option<WatchLog>, RepositoryError> {
        let model = watch_log_entity::Entity::find()
            .filter(watch_log_entity::Column::SourceId.eq(source_id))
            .filter(watch_log_entity::Column::DeletedAt.is_null())
            .order_by_desc(watch_log_entity::Column::CreatedAt)
            .order_by_desc(watch_log_entity::Column::Id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn list_for_source(&self, source_id: Uuid) -> Result<Vec<WatchLog>, RepositoryError> {
        let models = watch_log_entity::Entity::find()
            .filter(watch_log_entity::Column::SourceId.eq(source_id))
            .filter(watch_log_entity::Column::DeletedAt.is_null())
            .order_by_desc(watch_log_entity::Column::CreatedAt)
            .order_by_desc(watch_log_entity::Column::Id)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }
}
