// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 检查发现的单个内容条目
///
/// `natural_key` 是条目在来源内的自然键（内容指纹或 URI），
/// 结果协调以它为准而不是新生成的 ID。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredItem {
    pub natural_key: String,
    pub uri: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content_hash: Option<String>,
}

impl DiscoveredItem {
    pub fn new(natural_key: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            natural_key: natural_key.into(),
            uri: uri.into(),
            title: None,
            description: None,
            content_hash: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }
}

/// 一次检查周期的结果（不持久化）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// 检查成功，附带本次发现的全部条目
    Success { items: Vec<DiscoveredItem> },
    /// 网络/超时类失败，可重试
    TransientFailure { reason: String },
    /// 来源异常或鉴权被拒，本周期内不重试
    PermanentFailure { reason: String },
}

impl CheckOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            CheckOutcome::Success { .. } => OutcomeKind::Success,
            CheckOutcome::TransientFailure { .. } => OutcomeKind::TransientFailure,
            CheckOutcome::PermanentFailure { .. } => OutcomeKind::PermanentFailure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CheckOutcome::Success { .. })
    }

    /// 失败原因，成功时为 None
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            CheckOutcome::Success { .. } => None,
            CheckOutcome::TransientFailure { reason } | CheckOutcome::PermanentFailure { reason } => {
                Some(reason)
            }
        }
    }
}

/// 结果种类标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    TransientFailure,
    PermanentFailure,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutcomeKind::Success => write!(f, "success"),
            OutcomeKind::TransientFailure => write!(f, "transient_failure"),
            OutcomeKind::PermanentFailure => write!(f, "permanent_failure"),
        }
    }
}

/// 传给检查器的上一次检查状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousState {
    /// 上一次成功检查的条目集合摘要
    pub content_hash: String,
    /// 上一次记录内容变化的时间
    pub recorded_at: DateTime<Utc>,
}
