// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::check_outcome::{DiscoveredItem, PreviousState};
use crate::domain::models::source::SourceType;

#[derive(Error, Debug)]
pub enum CheckError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 可重试的失败（网络抖动、服务端错误等）
    #[error("Transient failure: {0}")]
    Transient(String),
    /// 不可重试的失败（地址不存在、无权访问等）
    #[error("Permanent failure: {0}")]
    Permanent(String),
    /// 超时
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl CheckError {
    /// 判断错误是否可重试
    ///
    /// # 返回值
    ///
    /// 如果错误是可重试的则返回true，否则返回false
    pub fn is_retryable(&self) -> bool {
        match self {
            CheckError::RequestFailed(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS
                    })
            }
            CheckError::Transient(_) | CheckError::Timeout(_) => true,
            CheckError::Permanent(_) => false,
        }
    }
}

/// 单次检查请求
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// 来源ID
    pub source_id: Uuid,
    /// 来源定位符
    pub uri: String,
    /// 来源类型
    pub source_type: SourceType,
    /// 上一次记录的检查状态，首次检查时为空
    pub previous_state: Option<PreviousState>,
}

/// 外部检查器
///
/// 抓取一个来源并返回其当前发布的条目
#[async_trait]
pub trait SourceChecker: Send + Sync {
    /// 执行检查
    async fn check(&self, request: &CheckRequest) -> Result<Vec<DiscoveredItem>, CheckError>;

    /// 检查器名称
    fn name(&self) -> &'static str;
}
