// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::article::Article;
use crate::domain::models::watch_log::WatchLog;
use crate::domain::repositories::entity_repository::{EntityRepository, Visibility};
use crate::utils::errors::RepositoryError;

/// 单个来源一个周期内的内容变更集
///
/// `changed` 中的实体携带其读取时的版本号，提交时逐条做条件更新。
#[derive(Debug, Clone, Default)]
pub struct ArticleChangeSet {
    pub created: Vec<Article>,
    pub changed: Vec<Article>,
    pub watch_log: Option<WatchLog>,
}

impl ArticleChangeSet {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.changed.is_empty() && self.watch_log.is_none()
    }
}

/// 内容仓库特质
#[async_trait]
pub trait ArticleRepository: EntityRepository<Article> {
    /// 列出某来源下的内容
    async fn list_for_source(
        &self,
        source_id: Uuid,
        visibility: Visibility,
    ) -> Result<Vec<Article>, RepositoryError>;

    /// 在一个事务内提交变更集：全部生效或全部不生效
    ///
    /// 任一条件更新版本不匹配时返回 `RepositoryError::Conflict`
    async fn commit_changes(&self, changes: &ArticleChangeSet) -> Result<(), RepositoryError>;
}
