// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::models::lifecycle::{EntityKind, EntityMeta, Lifecycle};
use crate::utils::retry_policy::cycle_backoff;

/// 来源实体
///
/// 一个可被周期性检查的外部位置（网页、订阅源或文档）。
/// 调度相关字段 `last_checked_at`、`next_due_at`、`consecutive_failures`
/// 只由来源登记处写入。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// 生命周期元数据
    pub meta: EntityMeta,
    /// 来源定位符，在存活来源中唯一
    pub uri: String,
    /// 来源类型，决定使用哪个检查器
    pub source_type: SourceType,
    /// 检查间隔
    pub check_interval: Duration,
    /// 最近一次检查完成的时间，从未检查时为空
    pub last_checked_at: Option<DateTime<Utc>>,
    /// 下一次到期时间
    pub next_due_at: DateTime<Utc>,
    /// 连续失败次数
    pub consecutive_failures: u32,
    /// 连续失败超过阈值后标记为降级，仍以封顶退避继续重试
    pub degraded: bool,
    /// 最近一次失败原因
    pub last_error: Option<String>,
}

/// 来源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// 普通网页
    #[default]
    Page,
    /// RSS/Atom 订阅源
    Rss,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SourceType::Page => write!(f, "page"),
            SourceType::Rss => write!(f, "rss"),
        }
    }
}

impl FromStr for SourceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page" => Ok(SourceType::Page),
            "rss" => Ok(SourceType::Rss),
            _ => Err(()),
        }
    }
}

/// 跨周期退避参数
#[derive(Debug, Clone, Copy)]
pub struct BackoffSettings {
    /// 退避上限
    pub max_backoff: Duration,
    /// 降级阈值
    pub degraded_failure_threshold: u32,
}

impl Source {
    /// 创建新来源，从未检查过的来源立即到期
    pub fn new(
        meta: EntityMeta,
        uri: impl Into<String>,
        source_type: SourceType,
        check_interval: Duration,
    ) -> Self {
        let next_due_at = meta.created_at;
        Self {
            meta,
            uri: uri.into(),
            source_type,
            check_interval,
            last_checked_at: None,
            next_due_at,
            consecutive_failures: 0,
            degraded: false,
            last_error: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_live() && self.next_due_at <= now
    }

    /// 记录一次成功检查
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.last_checked_at = Some(now);
        self.consecutive_failures = 0;
        self.degraded = false;
        self.last_error = None;
        self.next_due_at = offset(now, self.check_interval);
    }

    /// 记录一次失败检查并按指数退避推迟下次到期时间
    ///
    /// 失败周期不会刷新 `last_checked_at`
    pub fn record_failure(&mut self, now: DateTime<Utc>, reason: &str, backoff: BackoffSettings) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.degraded = self.consecutive_failures >= backoff.degraded_failure_threshold;
        self.last_error = Some(reason.to_string());

        let delay = if self.degraded {
            backoff.max_backoff
        } else {
            cycle_backoff(
                self.check_interval,
                self.consecutive_failures,
                backoff.max_backoff,
            )
        };
        self.next_due_at = offset(now, delay);
    }
}

/// `now + duration`，溢出时取可表示的最大时间
pub fn offset(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Lifecycle for Source {
    const KIND: EntityKind = EntityKind::Source;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<(), String> {
        url::Url::parse(&self.uri).map_err(|e| format!("invalid source uri {}: {}", self.uri, e))?;
        if self.check_interval.is_zero() {
            return Err("check interval must be greater than zero".to_string());
        }
        Ok(())
    }
}
