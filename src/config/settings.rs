// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// 应用程序配置设置
///
/// 包含数据库、调度器、检查器和遥测等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 调度器配置
    pub scheduler: SchedulerSettings,
    /// 检查器配置
    pub checker: CheckerSettings,
    /// 遥测配置
    pub telemetry: TelemetrySettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 调度器配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_backoff_ceiling"))]
pub struct SchedulerSettings {
    /// 轮询间隔（秒）
    #[validate(range(min = 1))]
    pub poll_interval_secs: u64,
    /// 同时进行的检查数上限 K
    #[validate(range(min = 1, max = 1024))]
    pub max_concurrency: usize,
    /// 单次检查尝试的超时（秒）
    #[validate(range(min = 1))]
    pub check_timeout_secs: u64,
    /// 周期内的最大尝试次数
    #[validate(range(min = 1, max = 20))]
    pub max_retry_attempts: u32,
    /// 周期内重试的基础延迟（毫秒）
    #[validate(range(min = 1))]
    pub retry_base_delay_ms: u64,
    /// 跨周期退避上限（秒）
    #[validate(range(min = 1))]
    pub max_backoff_secs: u64,
    /// 降级阈值
    #[validate(range(min = 1))]
    pub degraded_failure_threshold: u32,
    /// 停机时等待在途检查的宽限期（秒）
    #[validate(range(min = 1))]
    pub drain_grace_secs: u64,
    /// 每次轮询最多取出的到期来源数
    #[validate(range(min = 1))]
    pub batch_limit: u64,
    /// 检查间隔下限（秒）
    #[validate(range(min = 1))]
    pub min_check_interval_secs: u64,
    /// 未指定时的默认检查间隔（秒）
    #[validate(range(min = 1))]
    pub default_check_interval_secs: u64,
}

fn validate_backoff_ceiling(settings: &SchedulerSettings) -> Result<(), ValidationError> {
    if settings.max_backoff_secs.saturating_mul(1000) < settings.retry_base_delay_ms {
        return Err(ValidationError::new("max_backoff_below_retry_base_delay"));
    }
    if settings.default_check_interval_secs < settings.min_check_interval_secs {
        return Err(ValidationError::new("default_check_interval_below_minimum"));
    }
    Ok(())
}

/// 检查器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CheckerSettings {
    /// 请求使用的 User-Agent
    pub user_agent: String,
    /// HTTP 请求超时时间（秒）
    pub request_timeout_secs: u64,
}

/// 遥测配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    /// 以 JSON 格式输出日志
    pub json: bool,
    /// Prometheus 导出地址，为空时不启动导出器
    pub metrics_addr: Option<String>,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次加载默认值、`config/default`、`config/{APP_ENVIRONMENT}` 与
    /// `PUTEUS__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败或校验不通过
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Self::defaults(Config::builder())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("PUTEUS").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// 写入文档中的默认值
    pub fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            // Default DB settings
            .set_default("database.url", "sqlite://puteus.db?mode=rwc")?
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Default scheduler settings
            .set_default("scheduler.poll_interval_secs", 5)?
            .set_default("scheduler.max_concurrency", 4)?
            .set_default("scheduler.check_timeout_secs", 30)?
            .set_default("scheduler.max_retry_attempts", 3)?
            .set_default("scheduler.retry_base_delay_ms", 1000)?
            .set_default("scheduler.max_backoff_secs", 3600)?
            .set_default("scheduler.degraded_failure_threshold", 5)?
            .set_default("scheduler.drain_grace_secs", 10)?
            .set_default("scheduler.batch_limit", 100)?
            .set_default("scheduler.min_check_interval_secs", 10)?
            .set_default("scheduler.default_check_interval_secs", 300)?
            // Default checker settings
            .set_default("checker.user_agent", concat!("puteus/", env!("CARGO_PKG_VERSION")))?
            .set_default("checker.request_timeout_secs", 30)?
            // Default telemetry settings
            .set_default("telemetry.json", false)
    }

    /// 校验各配置段
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduler
            .validate()
            .map_err(|e| ConfigError::Message(format!("invalid scheduler settings: {}", e)))?;
        if self.checker.request_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "checker.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// 调度器运行参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub max_concurrency: usize,
    pub check_timeout: Duration,
    pub max_retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub max_backoff: Duration,
    pub degraded_failure_threshold: u32,
    pub drain_grace: Duration,
    pub batch_limit: u64,
    pub min_check_interval: Duration,
    pub default_check_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_concurrency: 4,
            check_timeout: Duration::from_secs(30),
            max_retry_attempts: 3,
            retry_base_delay: Duration::from_millis(1000),
            max_backoff: Duration::from_secs(3600),
            degraded_failure_threshold: 5,
            drain_grace: Duration::from_secs(10),
            batch_limit: 100,
            min_check_interval: Duration::from_secs(10),
            default_check_interval: Duration::from_secs(300),
        }
    }
}

impl SchedulerSettings {
    pub fn to_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_concurrency: self.max_concurrency,
            check_timeout: Duration::from_secs(self.check_timeout_secs),
            max_retry_attempts: self.max_retry_attempts,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
            degraded_failure_threshold: self.degraded_failure_threshold,
            drain_grace: Duration::from_secs(self.drain_grace_secs),
            batch_limit: self.batch_limit,
            min_check_interval: Duration::from_secs(self.min_check_interval_secs),
            default_check_interval: Duration::from_secs(self.default_check_interval_secs),
        }
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
