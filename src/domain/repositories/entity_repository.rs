// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::lifecycle::Lifecycle;
use crate::utils::errors::RepositoryError;

/// 读取可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// 默认：排除软删除的实体
    #[default]
    LiveOnly,
    /// 包含软删除的实体
    IncludeDeleted,
}

impl Visibility {
    pub fn admits<E: Lifecycle>(self, entity: &E) -> bool {
        self == Visibility::IncludeDeleted || entity.is_live()
    }
}

/// 通用实体仓库特质
///
/// 所有实体共享的持久化契约。写入采用乐观并发：
/// `update_if_version` 仅在存储中的版本等于 `entity.meta().version` 时生效，
/// 并返回版本号加一后的实体。
#[async_trait]
pub trait EntityRepository<E: Lifecycle>: Send + Sync {
    /// 插入新实体
    async fn insert(&self, entity: &E) -> Result<E, RepositoryError>;

    /// 根据ID查找实体
    async fn find_by_id(&self, id: Uuid, visibility: Visibility)
        -> Result<Option<E>, RepositoryError>;

    /// 列出实体
    async fn list(&self, visibility: Visibility) -> Result<Vec<E>, RepositoryError>;

    /// 条件更新
    ///
    /// * `Err(RepositoryError::Conflict)` - 存储中的版本已变化
    /// * `Err(RepositoryError::NotFound)` - 实体不存在
    async fn update_if_version(&self, entity: &E) -> Result<E, RepositoryError>;
}
