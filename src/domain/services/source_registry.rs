// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::settings::SchedulerConfig;
use crate::domain::events::{EventSink, LifecycleEvent};
use crate::domain::models::check_outcome::CheckOutcome;
use crate::domain::models::lifecycle::Lifecycle;
use crate::domain::models::source::{offset, BackoffSettings, Source, SourceType};
use crate::domain::repositories::entity_repository::Visibility;
use crate::domain::repositories::source_repository::SourceRepository;
use crate::domain::services::lifecycle_service::LifecycleService;
use crate::utils::clock::Clock;
use crate::utils::errors::DomainError;

/// 登记请求校验
#[derive(Debug, Validate)]
struct SourceRegistration {
    #[validate(url(message = "source uri must be an absolute URL"))]
    uri: String,
    #[validate(range(min = 1, message = "check interval must be at least one second"))]
    check_interval_secs: u64,
}

/// 来源登记策略
#[derive(Debug, Clone, Copy)]
pub struct RegistryPolicy {
    /// 检查间隔下限
    pub min_check_interval: Duration,
    /// 登记时未指定间隔时使用
    pub default_check_interval: Duration,
    /// 跨周期退避
    pub backoff: BackoffSettings,
}

impl From<&SchedulerConfig> for RegistryPolicy {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            min_check_interval: config.min_check_interval,
            default_check_interval: config.default_check_interval,
            backoff: BackoffSettings {
                max_backoff: config.max_backoff,
                degraded_failure_threshold: config.degraded_failure_threshold,
            },
        }
    }
}

/// 来源登记处
///
/// 来源记录的唯一写入者，负责登记、注销以及调度字段
/// （`last_checked_at`、`next_due_at`、`consecutive_failures`）的维护。
pub struct SourceRegistry {
    lifecycle: LifecycleService<Source, dyn SourceRepository>,
    repository: Arc<dyn SourceRepository>,
    policy: RegistryPolicy,
}

impl SourceRegistry {
    pub fn new(
        repository: Arc<dyn SourceRepository>,
        policy: RegistryPolicy,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            lifecycle: LifecycleService::new(repository.clone(), clock, events),
            repository,
            policy,
        }
    }

    pub fn policy(&self) -> &RegistryPolicy {
        &self.policy
    }

    /// 登记新来源
    ///
    /// # 参数
    ///
    /// * `uri` - 来源定位符
    /// * `source_type` - 来源类型
    /// * `check_interval` - 检查间隔，整秒且不得低于策略下限；为 `None` 时使用策略默认值
    ///
    /// # 返回值
    ///
    /// * `Ok(Source)` - 新登记的来源，立即到期
    /// * `Err(DomainError::DuplicateSource)` - 已存在相同定位符的存活来源
    /// * `Err(DomainError::Validation)` - 定位符或间隔非法
    pub async fn register(
        &self,
        uri: &str,
        source_type: SourceType,
        check_interval: impl Into<Option<Duration>>,
    ) -> Result<Source, DomainError> {
        let check_interval = check_interval
            .into()
            .unwrap_or(self.policy.default_check_interval);
        let uri = uri.trim().to_string();
        SourceRegistration {
            uri: uri.clone(),
            check_interval_secs: check_interval.as_secs(),
        }
        .validate()
        .map_err(|e| DomainError::Validation(e.to_string()))?;

        self.check_interval_floor(check_interval)?;

        if self.repository.find_live_by_uri(&uri).await?.is_some() {
            return Err(DomainError::DuplicateSource(uri));
        }

        let created = self
            .lifecycle
            .create(|meta| Source::new(meta, uri.clone(), source_type, check_interval))
            .await;

        match created {
            Ok(source) => {
                info!(source_id = %source.id(), uri = %source.uri, "Source registered");
                Ok(source)
            }
            // 并发登记：唯一约束在存储层生效
            Err(DomainError::Validation(reason)) => {
                if self.repository.find_live_by_uri(&uri).await?.is_some() {
                    Err(DomainError::DuplicateSource(uri))
                } else {
                    Err(DomainError::Validation(reason))
                }
            }
            Err(e) => Err(e),
        }
    }

    /// 查询到期来源，按 `next_due_at` 升序
    pub async fn due_sources(
        &self,
        now: DateTime<Utc>,
        limit: u64,
        exclude: &[Uuid],
    ) -> Result<Vec<Source>, DomainError> {
        Ok(self.repository.due_sources(now, limit, exclude).await?)
    }

    /// 记录一次检查的结果并重新计算下次到期时间
    ///
    /// 成功：`last_checked_at = now`，失败计数清零，`next_due_at = now + check_interval`。
    /// 失败：失败计数加一，`next_due_at = now + min(check_interval * 2^failures, max_backoff)`；
    /// 超过降级阈值后直接使用 `max_backoff`。
    pub async fn mark_checked(
        &self,
        source: &Source,
        outcome: &CheckOutcome,
    ) -> Result<Source, DomainError> {
        let now = self.lifecycle.clock().now();
        let backoff = self.policy.backoff;

        let updated = self
            .lifecycle
            .update(source, |current| match outcome.failure_reason() {
                None => current.record_success(now),
                Some(reason) => current.record_failure(now, reason, backoff),
            })
            .await?;

        self.lifecycle.events().emit(&LifecycleEvent::SourceChecked {
            source_id: updated.id(),
            outcome: outcome.kind(),
        });

        if updated.degraded {
            warn!(
                source_id = %updated.id(),
                failures = updated.consecutive_failures,
                next_due_at = %updated.next_due_at,
                "Source is degraded, retrying at capped backoff"
            );
        }

        Ok(updated)
    }

    /// 注销来源（软删除）
    pub async fn deregister(&self, source: &Source) -> Result<Source, DomainError> {
        let deleted = self.lifecycle.soft_delete(source).await?;
        info!(source_id = %deleted.id(), "Source deregistered");
        Ok(deleted)
    }

    /// 恢复已注销的来源
    ///
    /// 若其定位符已被新的存活来源占用，返回 `DomainError::DuplicateSource`
    pub async fn restore(&self, source: &Source) -> Result<Source, DomainError> {
        if let Some(live) = self.repository.find_live_by_uri(&source.uri).await? {
            if live.id() != source.id() {
                return Err(DomainError::DuplicateSource(source.uri.clone()));
            }
        }
        self.lifecycle.restore(source).await
    }

    /// 修改检查间隔
    pub async fn update_interval(
        &self,
        source: &Source,
        check_interval: Duration,
    ) -> Result<Source, DomainError> {
        self.check_interval_floor(check_interval)?;
        self.lifecycle
            .update(source, |current| {
                current.check_interval = check_interval;
                if current.consecutive_failures == 0 {
                    if let Some(last_checked_at) = current.last_checked_at {
                        current.next_due_at = offset(last_checked_at, check_interval);
                    }
                }
            })
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Source>, DomainError> {
        self.lifecycle.get(id).await
    }

    pub async fn get_with(&self, id: Uuid, visibility: Visibility) -> Result<Option<Source>, DomainError> {
        self.lifecycle.get_with(id, visibility).await
    }

    pub async fn list(&self, visibility: Visibility) -> Result<Vec<Source>, DomainError> {
        self.lifecycle.list(visibility).await
    }

    /// 间隔以整秒持久化，不足一秒的部分会被拒绝
    fn check_interval_floor(&self, check_interval: Duration) -> Result<(), DomainError> {
        if check_interval.subsec_nanos() != 0 {
            return Err(DomainError::Validation(format!(
                "check interval {:?} must be a whole number of seconds",
                check_interval
            )));
        }
        if check_interval < self.policy.min_check_interval {
            return Err(DomainError::Validation(format!(
                "check interval {:?} is below the minimum of {:?}",
                check_interval, self.policy.min_check_interval
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "source_registry_test.rs"]
mod tests;
