// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::events::{EventSink, LifecycleEvent};
use crate::domain::models::lifecycle::{EntityKind, EntityMeta, Lifecycle};
use crate::domain::repositories::entity_repository::{EntityRepository, Visibility};
use crate::utils::clock::Clock;
use crate::utils::errors::{DomainError, RepositoryError};

/// 条件更新遇到版本冲突时的最大尝试次数
const MAX_CONFLICT_ATTEMPTS: u32 = 3;

/// 实体生命周期服务
///
/// 创建、更新、软删除与恢复的唯一写入路径，对所有实体类型复用。
/// 同一实体的并发写入由仓库的条件更新串行化：冲突时重新读取最新版本
/// 并重放状态转换。
pub struct LifecycleService<E, R: ?Sized> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    _entity: PhantomData<fn() -> E>,
}

impl<E, R: ?Sized> Clone for LifecycleService<E, R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            clock: self.clock.clone(),
            events: self.events.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E, R> LifecycleService<E, R>
where
    E: Lifecycle,
    R: EntityRepository<E> + ?Sized,
{
    pub fn new(repository: Arc<R>, clock: Arc<dyn Clock>, events: Arc<dyn EventSink>) -> Self {
        Self {
            repository,
            clock,
            events,
            _entity: PhantomData,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// 创建实体
    ///
    /// 分配 `id`，`created_at = updated_at = now`，`deleted_at = None`，
    /// 再由 `build` 组装实体。
    ///
    /// # 返回值
    ///
    /// * `Ok(E)` - 已持久化的实体
    /// * `Err(DomainError::Validation)` - 违反实体约束或唯一约束
    pub async fn create<F>(&self, build: F) -> Result<E, DomainError>
    where
        F: FnOnce(EntityMeta) -> E + Send,
    {
        let entity = build(EntityMeta::new(self.clock.now()));
        entity.validate().map_err(DomainError::Validation)?;

        let saved = match self.repository.insert(&entity).await {
            Ok(saved) => saved,
            Err(RepositoryError::AlreadyExists) => {
                return Err(DomainError::Validation(format!(
                    "{} {} violates a uniqueness constraint",
                    E::KIND,
                    entity.id()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        debug!(kind = %E::KIND, id = %saved.id(), "Entity created");
        self.events.emit(&LifecycleEvent::EntityCreated {
            kind: E::KIND,
            entity_id: saved.id(),
        });
        Ok(saved)
    }

    /// 应用补丁并刷新 `updated_at`
    ///
    /// 补丁未修改的字段保持不变；实体已不存在时返回 `DomainError::NotFound`
    pub async fn update<F>(&self, entity: &E, mut patch: F) -> Result<E, DomainError>
    where
        F: FnMut(&mut E) + Send,
    {
        self.mutate(
            entity,
            |next, now| {
                patch(next);
                next.touch(now);
                true
            },
            |kind, entity_id| LifecycleEvent::EntityUpdated { kind, entity_id },
        )
        .await
    }

    /// 软删除，已删除时原样返回
    pub async fn soft_delete(&self, entity: &E) -> Result<E, DomainError> {
        self.mutate(
            entity,
            |next, now| next.mark_deleted(now),
            |kind, entity_id| LifecycleEvent::EntitySoftDeleted { kind, entity_id },
        )
        .await
    }

    /// 恢复软删除的实体，已存活时原样返回
    pub async fn restore(&self, entity: &E) -> Result<E, DomainError> {
        self.mutate(
            entity,
            |next, now| next.mark_restored(now),
            |kind, entity_id| LifecycleEvent::EntityRestored { kind, entity_id },
        )
        .await
    }

    /// 读取存活实体
    pub async fn get(&self, id: Uuid) -> Result<Option<E>, DomainError> {
        self.get_with(id, Visibility::LiveOnly).await
    }

    pub async fn get_with(&self, id: Uuid, visibility: Visibility) -> Result<Option<E>, DomainError> {
        Ok(self.repository.find_by_id(id, visibility).await?)
    }

    pub async fn list(&self, visibility: Visibility) -> Result<Vec<E>, DomainError> {
        Ok(self.repository.list(visibility).await?)
    }

    async fn mutate<F>(
        &self,
        entity: &E,
        mut transition: F,
        event: fn(EntityKind, Uuid) -> LifecycleEvent,
    ) -> Result<E, DomainError>
    where
        F: FnMut(&mut E, DateTime<Utc>) -> bool + Send,
    {
        let id = entity.id();
        let mut current = entity.clone();

        for attempt in 1..=MAX_CONFLICT_ATTEMPTS {
            let mut next = current.clone();
            if !transition(&mut next, self.clock.now()) {
                return Ok(current);
            }
            next.validate().map_err(DomainError::Validation)?;

            match self.repository.update_if_version(&next).await {
                Ok(saved) => {
                    self.events.emit(&event(E::KIND, id));
                    return Ok(saved);
                }
                Err(RepositoryError::Conflict) => {
                    debug!(kind = %E::KIND, %id, attempt, "Version conflict, reloading entity");
                    current = self
                        .repository
                        .find_by_id(id, Visibility::IncludeDeleted)
                        .await?
                        .ok_or(DomainError::NotFound(id))?;
                }
                Err(RepositoryError::NotFound) => return Err(DomainError::NotFound(id)),
                Err(e) => return Err(e.into()),
            }
        }

        Err(DomainError::Conflict(id))
    }
}

#[cfg(test)]
#[path = "lifecycle_service_test.rs"]
mod tests;
