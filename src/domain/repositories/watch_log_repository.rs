// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::watch_log::WatchLog;
use crate::utils::errors::RepositoryError;

/// 检查历史仓库特质
///
/// 写入只通过 `ArticleRepository::commit_changes` 与内容变更一同提交
#[async_trait]
pub trait WatchLogRepository: Send + Sync {
    /// 某来源最近一条存活的检查历史
    async fn latest_for_source(&self, source_id: Uuid) -> Result<Option<WatchLog>, RepositoryError>;

    /// 某来源的检查历史，按创建时间倒序
    async fn list_for_source(&self, source_id: Uuid) -> Result<Vec<WatchLog>, RepositoryError>;
}
