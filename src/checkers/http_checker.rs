// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

use crate::checkers::traits::{CheckError, CheckRequest, SourceChecker};
use crate::config::settings::CheckerSettings;
use crate::domain::models::check_outcome::DiscoveredItem;

/// 整页检查器
///
/// 把响应正文整体视为一个条目，以正文的 SHA-256 作为自然键
pub struct HttpPageChecker {
    client: reqwest::Client,
}

impl HttpPageChecker {
    pub fn new(settings: &CheckerSettings) -> Result<Self, CheckError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SourceChecker for HttpPageChecker {
    /// 抓取来源页面
    ///
    /// # 返回值
    ///
    /// * `Ok(Vec<DiscoveredItem>)` - 仅含一个条目
    /// * `Err(CheckError::Transient)` - 5xx 或 429
    /// * `Err(CheckError::Permanent)` - 其他非成功状态码
    async fn check(&self, request: &CheckRequest) -> Result<Vec<DiscoveredItem>, CheckError> {
        let response = self.client.get(&request.uri).send().await?;
        let status = response.status();

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CheckError::Transient(format!("{} returned {}", request.uri, status)));
        }
        if !status.is_success() {
            return Err(CheckError::Permanent(format!("{} returned {}", request.uri, status)));
        }

        let body = response.text().await?;
        let digest = hex::encode(Sha256::digest(body.as_bytes()));

        debug!(source_id = %request.source_id, bytes = body.len(), %digest, "Fetched source page");

        Ok(vec![
            DiscoveredItem::new(digest.clone(), request.uri.clone()).with_content_hash(digest)
        ])
    }

    fn name(&self) -> &'static str {
        "http_page"
    }
}
