// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// 记录未找到
    #[error("Record not found")]
    NotFound,

    /// 乐观锁冲突：存储中的版本已比调用方持有的版本更新
    #[error("Version conflict")]
    Conflict,

    /// 违反唯一约束
    #[error("Record already exists")]
    AlreadyExists,

    /// 存储不可达
    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

/// 领域错误类型
///
/// 生命周期操作与来源登记对外暴露的错误
#[derive(Error, Debug)]
pub enum DomainError {
    /// 载荷违反实体约束，不会自动重试
    #[error("Validation error: {0}")]
    Validation(String),

    /// 引用的实体不存在
    #[error("Entity {0} not found")]
    NotFound(Uuid),

    /// 已存在相同定位符的存活来源
    #[error("A live source with locator {0} is already registered")]
    DuplicateSource(String),

    /// 并发写入冲突，重试次数用尽
    #[error("Entity {0} was modified concurrently")]
    Conflict(Uuid),

    /// 底层仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl DomainError {
    /// 是否属于基础设施错误（仓库不可达等）
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, DomainError::Repository(_))
    }
}
