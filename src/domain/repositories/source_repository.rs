// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::models::source::Source;
use crate::domain::repositories::entity_repository::EntityRepository;
use crate::utils::errors::RepositoryError;

/// 来源仓库特质
#[async_trait]
pub trait SourceRepository: EntityRepository<Source> {
    /// 按定位符查找存活来源
    async fn find_live_by_uri(&self, uri: &str) -> Result<Option<Source>, RepositoryError>;

    /// 查询到期来源
    ///
    /// 返回至多 `limit` 个 `next_due_at <= now` 的存活来源，按 `next_due_at` 升序，
    /// 并排除 `exclude` 中正在检查的来源。
    async fn due_sources(
        &self,
        now: DateTime<Utc>,
        limit: u64,
        exclude: &[Uuid],
    ) -> Result<Vec<Source>, RepositoryError>;
}
