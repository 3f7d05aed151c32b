// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};

use crate::checkers::registry::CheckerRegistry;
use crate::checkers::traits::{CheckError, CheckRequest};
use crate::config::settings::SchedulerConfig;
use crate::domain::models::check_outcome::{CheckOutcome, PreviousState};
use crate::domain::models::lifecycle::Lifecycle;
use crate::domain::models::source::Source;
use crate::infrastructure::observability::metrics::record_check_duration;
use crate::utils::retry_policy::RetryPolicy;

/// 检查执行器
///
/// 对一个来源执行一次检查周期：按来源类型选择检查器，
/// 每次尝试都受超时约束，可重试的失败在周期内按指数退避重试。
/// 永远返回一个 `CheckOutcome`，不会把错误抛给调用方。
pub struct CheckExecutor {
    checkers: CheckerRegistry,
    retry_policy: RetryPolicy,
    check_timeout: Duration,
}

impl CheckExecutor {
    pub fn new(checkers: CheckerRegistry, retry_policy: RetryPolicy, check_timeout: Duration) -> Self {
        Self {
            checkers,
            retry_policy,
            check_timeout,
        }
    }

    /// 根据调度器配置创建执行器
    pub fn from_config(checkers: CheckerRegistry, config: &SchedulerConfig) -> Self {
        Self::new(
            checkers,
            RetryPolicy::exponential(
                config.max_retry_attempts,
                config.retry_base_delay,
                config.max_backoff,
            ),
            config.check_timeout,
        )
    }

    /// 执行一次检查周期
    ///
    /// # 参数
    ///
    /// * `source` - 待检查的来源
    /// * `previous_state` - 上一次记录的检查状态
    ///
    /// # 返回值
    ///
    /// * `CheckOutcome::Success` - 检查器返回了条目集合
    /// * `CheckOutcome::TransientFailure` - 重试次数用尽仍失败
    /// * `CheckOutcome::PermanentFailure` - 没有对应的检查器或错误不可重试
    #[instrument(skip_all, fields(source_id = %source.id(), uri = %source.uri))]
    pub async fn check(&self, source: &Source, previous_state: Option<PreviousState>) -> CheckOutcome {
        let Some(checker) = self.checkers.resolve(source.source_type) else {
            warn!(source_type = %source.source_type, "No checker registered for source type");
            return CheckOutcome::PermanentFailure {
                reason: format!("no checker registered for source type {}", source.source_type),
            };
        };

        let request = CheckRequest {
            source_id: source.id(),
            uri: source.uri.clone(),
            source_type: source.source_type,
            previous_state,
        };

        let started = Instant::now();
        let mut attempt = 1;
        let outcome = loop {
            let result = match timeout(self.check_timeout, checker.check(&request)).await {
                Ok(result) => result,
                Err(_) => Err(CheckError::Timeout(self.check_timeout)),
            };

            match result {
                Ok(items) => {
                    debug!(checker = checker.name(), attempt, items = items.len(), "Check succeeded");
                    break CheckOutcome::Success { items };
                }
                Err(e) if !e.is_retryable() => {
                    warn!(checker = checker.name(), attempt, error = %e, "Check failed permanently");
                    break CheckOutcome::PermanentFailure {
                        reason: e.to_string(),
                    };
                }
                Err(e) if !self.retry_policy.should_retry(attempt) => {
                    warn!(checker = checker.name(), attempt, error = %e, "Check failed, retries exhausted");
                    break CheckOutcome::TransientFailure {
                        reason: e.to_string(),
                    };
                }
                Err(e) => {
                    let delay = self.retry_policy.calculate_backoff(attempt);
                    debug!(
                        checker = checker.name(),
                        attempt,
                        error = %e,
                        "Check attempt failed, retrying in {:?}",
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        };

        record_check_duration(started.elapsed());
        outcome
    }
}

#[cfg(test)]
#[path = "check_executor_test.rs"]
mod tests;
