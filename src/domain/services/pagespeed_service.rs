// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::PageSpeedSettings;
use crate::domain::services::availability_checker::parse_retry_after;
use crate::domain::services::resolution::ResolveError;
use crate::infrastructure::ip_metadata::LookupError;
use crate::utils::retry_policy::{sleep_or_cancel, RetryPolicy};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 评分结果，单项查询失败时为 `None`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSpeedScores {
    pub mobile: Option<u8>,
    pub desktop: Option<u8>,
    pub seo: Option<u8>,
}

#[derive(Debug, Clone, Copy)]
enum Query {
    Mobile,
    Desktop,
    Seo,
}

impl Query {
    fn params(self) -> (&'static str, &'static str) {
        match self {
            Query::Mobile => ("mobile", "performance"),
            Query::Desktop => ("desktop", "performance"),
            Query::Seo => ("desktop", "seo"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageSpeedResponse {
    lighthouse_result: LighthouseResult,
}

#[derive(Debug, Deserialize)]
struct LighthouseResult {
    categories: Categories,
}

#[derive(Debug, Deserialize)]
struct Categories {
    performance: Option<Category>,
    seo: Option<Category>,
}

#[derive(Debug, Deserialize)]
struct Category {
    score: Option<f64>,
}

/// PageSpeed 评分服务
///
/// 移动端、桌面端与 SEO 三个查询并发执行，各自按固定间隔重试
pub struct PageSpeedService {
    endpoint: String,
    api_key: Option<String>,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl PageSpeedService {
    pub fn new(settings: &PageSpeedSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            retry: RetryPolicy::fixed(
                settings.max_attempts.max(1),
                Duration::from_millis(settings.retry_delay_ms),
            ),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(settings.timeout_secs))
                .build()
                .unwrap_or_default(),
        }
    }

    /// 查询网站评分
    ///
    /// # 参数
    ///
    /// * `url` - 完整网址
    /// * `cancel` - 取消信号
    ///
    /// # 返回值
    ///
    /// * `Ok(PageSpeedScores)` - 评分（0-100）
    /// * `Err(ResolveError::Cancelled)` - 被取消
    pub async fn scores(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<PageSpeedScores, ResolveError> {
        let (mobile, desktop, seo) = tokio::join!(
            self.query_with_retry(url, Query::Mobile, cancel),
            self.query_with_retry(url, Query::Desktop, cancel),
            self.query_with_retry(url, Query::Seo, cancel),
        );
        Ok(PageSpeedScores {
            mobile: mobile?,
            desktop: desktop?,
            seo: seo?,
        })
    }

    async fn query_with_retry(
        &self,
        url: &str,
        query: Query,
        cancel: &CancellationToken,
    ) -> Result<Option<u8>, ResolveError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
                outcome = self.query(url, query) => outcome,
            };
            let (error, delay) = match outcome {
                Ok(score) => return Ok(score),
                Err((e, retry_after)) => {
                    let delay = retry_after.unwrap_or_else(|| self.retry.calculate_backoff(attempt));
                    (e, delay)
                }
            };
            if !error.is_transient() || !self.retry.should_retry(attempt) {
                warn!("PageSpeed {:?} query for {} failed: {}", query, url, error);
                return Ok(None);
            }
            debug!("PageSpeed {:?} attempt {} failed: {}", query, attempt, error);
            sleep_or_cancel(delay, cancel).await?;
        }
    }

    async fn query(
        &self,
        url: &str,
        query: Query,
    ) -> Result<Option<u8>, (LookupError, Option<Duration>)> {
        let (strategy, category) = query.params();
        let mut params = vec![("url", url), ("strategy", strategy), ("category", category)];
        if let Some(key) = &self.api_key {
            params.push(("key", key.as_str()));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| (LookupError::from(e), None))?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err((LookupError::Status(status), retry_after));
        }
        if !response.status().is_success() {
            return Err((LookupError::Status(status), None));
        }

        let body: PageSpeedResponse = response
            .json()
            .await
            .map_err(|e| (LookupError::Decode(e.to_string()), None))?;
        let category = match query {
            Query::Seo => body.lighthouse_result.categories.seo,
            _ => body.lighthouse_result.categories.performance,
        };
        Ok(category
            .and_then(|c| c.score)
            .map(|s| (s * 100.0).round().clamp(0.0, 100.0) as u8))
    }
}
