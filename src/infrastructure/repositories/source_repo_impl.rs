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

use crate::domain::models::lifecycle::{EntityMeta, Lifecycle};
use crate::domain::models::source::Source;
use crate::domain::repositories::entity_repository::{EntityRepository, Visibility};
use crate::domain::repositories::source_repository::SourceRepository;
use crate::infrastructure::database::entities::source as source_entity;
use crate::infrastructure::repositories::map_write_error;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// 来源仓库实现
///
/// 基于SeaORM实现的来源数据访问层
#[derive(Clone)]
pub struct SourceRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl SourceRepositoryImpl {
    /// 创建新的来源仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<source_entity::Model> for Source {
    fn from(model: source_entity::Model) -> Self {
        Self {
            meta: EntityMeta {
                id: model.id,
                version: model.version,
                created_at: model.created_at,
                updated_at: model.updated_at,
                deleted_at: model.deleted_at,
            },
            uri: model.uri,
            source_type: model.source_type.parse().unwrap_or_default(),
            check_interval: Duration::from_secs(u64::try_from(model.check_interval_secs).unwrap_or(0)),
            last_checked_at: model.last_checked_at,
            next_due_at: model.next_due_at,
            consecutive_failures: u32::try_from(model.consecutive_failures).unwrap_or(0),
            degraded: model.degraded,
            last_error: model.last_error,
        }
    }
}

impl From<&Source> for source_entity::ActiveModel {
    fn from(source: &Source) -> Self {
        Self {
            id: Set(source.meta.id),
            version: Set(source.meta.version),
            uri: Set(source.uri.clone()),
            source_type: Set(source.source_type.to_string()),
            check_interval_secs: Set(i64::try_from(source.check_interval.as_secs()).unwrap_or(i64::MAX)),
            last_checked_at: Set(source.last_checked_at),
            next_due_at: Set(source.next_due_at),
            consecutive_failures: Set(i32::try_from(source.consecutive_failures).unwrap_or(i32::MAX)),
            degraded: Set(source.degraded),
            last_error: Set(source.last_error.clone()),
            created_at: Set(source.meta.created_at),
            updated_at: Set(source.meta.updated_at),
            deleted_at: Set(source.meta.deleted_at),
        }
    }
}

fn visible(visibility: Visibility) -> sea_orm::Condition {
    let condition = sea_orm::Condition::all();
    match visibility {
        Visibility::LiveOnly => condition.add(source_entity::Column::DeletedAt.is_null()),
        Visibility::IncludeDeleted => condition,
    }
}

#[async_trait]
impl EntityRepository<Source> for SourceRepositoryImpl {
    async fn insert(&self, entity: &Source) -> Result<Source, RepositoryError> {
        let model: source_entity::ActiveModel = entity.into();
        model.insert(self.db.as_ref()).await.map_err(map_write_error)?;
        Ok(entity.clone())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        visibility: Visibility,
    ) -> Result<Option<Source>, RepositoryError> {
        let model = source_entity::Entity::find_by_id(id)
            .filter(visible(visibility))
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn list(&self, visibility: Visibility) -> Result<Vec<Source>, RepositoryError> {
        let models = source_entity::Entity::find()
            .filter(visible(visibility))
            .order_by_asc(source_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn update_if_version(&self, entity: &Source) -> Result<Source, RepositoryError> {
        let expected = entity.meta.version;
        let mut model: source_entity::ActiveModel = entity.into();
        model.id = NotSet;
        model.created_at = NotSet;
        model.version = Set(expected + 1);

        let result = source_entity::Entity::update_many()
            .set(model)
            .filter(source_entity::Column::Id.eq(entity.id()))
            .filter(source_entity::Column::Version.eq(expected))
            .exec(self.db.as_ref())
            .await
            .map_err(map_write_error)?;

        if result.rows_affected == 0 {
            let exists = source_entity::Entity::find_by_id(entity.id())
                .count(self.db.as_ref())
                .await?
                > 0;
            return Err(if exists {
                RepositoryError::Conflict
            } else {
                RepositoryError::NotFound
            });
        }

        let mut saved = entity.clone();
        saved.meta.version = expected + 1;
        Ok(saved)
    }
}

#[async_trait]
impl SourceRepository for SourceRepositoryImpl {
    async fn find_live_by_uri(&self, uri: &str) -> Result<Option<Source>, RepositoryError> {
        let model = source_entity::Entity::find()
            .filter(source_entity::Column::Uri.eq(uri))
            .filter(source_entity::Column::DeletedAt.is_null())
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn due_sources(
        &self,
        now: DateTime<Utc>,
        limit: u64,
        exclude: &[Uuid],
    ) -> Result<Vec<Source>, RepositoryError> {
        let mut query = source_entity::Entity::find()
            .filter(source_entity::Column::DeletedAt.is_null())
            .filter(source_entity::Column::NextDueAt.lte(now));

        if !exclude.is_empty() {
            query = query.filter(source_entity::Column::Id.is_not_in(exclude.iter().copied()));
        }

        let models = query
            .order_by_asc(source_entity::Column::NextDueAt)
            .order_by_asc(source_entity::Column::CreatedAt)
            .order_by_asc(source_entity::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }
}
