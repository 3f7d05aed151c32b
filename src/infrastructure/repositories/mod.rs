// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供领域仓库接口的具体实现：SeaORM 数据库实现与内存实现
pub mod article_repo_impl;
pub mod memory_repo;
pub mod source_repo_impl;

use crate::utils::errors::RepositoryError;
use sea_orm::{DbErr, SqlErr};

/// 把唯一约束冲突映射为 `RepositoryError::AlreadyExists`
pub(crate) fn map_write_error(err: DbErr) -> RepositoryError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => RepositoryError::AlreadyExists,
        _ => RepositoryError::Database(err),
    }
}
