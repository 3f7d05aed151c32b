// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

/// 单次检查周期内的重试策略配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（包含首次尝试）
    pub max_attempts: u32,
    /// 初始退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 是否启用抖动
    pub enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            enable_jitter: false,
        }
    }
}

impl RetryPolicy {
    /// 根据尝试次数、基础延迟与上限创建无抖动的指数退避策略
    pub fn exponential(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
            ..Self::default()
        }
    }

    /// 启用抖动
    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.enable_jitter = true;
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// 计算第 `attempt` 次失败后的退避时间
    ///
    /// attempt 从 1 开始：`initial_backoff * multiplier^(attempt-1)`，上限为 `max_backoff`
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let backoff_secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        let capped_backoff = backoff_secs.min(self.max_backoff.as_secs_f64());

        let final_backoff = if self.enable_jitter && capped_backoff > 0.0 {
            let jitter_range = capped_backoff * self.jitter_factor;
            if jitter_range > 0.0 {
                let jitter = rand::random_range(-jitter_range..jitter_range);
                (capped_backoff + jitter).max(0.0)
            } else {
                capped_backoff
            }
        } else {
            capped_backoff
        };

        Duration::from_secs_f64(final_backoff)
    }

    /// 第 `attempt` 次尝试失败后是否还应继续尝试
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// 计算跨周期退避：`min(check_interval * 2^failures, max_backoff)`
///
/// 乘法溢出时直接取上限
pub fn cycle_backoff(check_interval: Duration, failures: u32, max_backoff: Duration) -> Duration {
    if failures >= 32 {
        return max_backoff;
    }
    check_interval
        .checked_mul(1u32 << failures)
        .map_or(max_backoff, |delay| delay.min(max_backoff))
}
