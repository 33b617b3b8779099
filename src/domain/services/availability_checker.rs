// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::AvailabilitySettings;
use crate::domain::services::resolution::ResolveError;
use crate::engines::traits::{FetchRequest, FetchResponse, Fetcher};
use crate::utils::retry_policy::{sleep_or_cancel, RetryPolicy};
use crate::utils::url_utils::resolve_url;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 站点可访问
pub const AVAILABLE: &str = "available";
/// 401
pub const NOT_AUTHORIZED: &str = "not authorized";
/// 404
pub const NOT_FOUND: &str = "not found";
/// 超出重定向上限
pub const TOO_MANY_REDIRECTS: &str = "too many redirects";

/// 可用性检测结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityOutcome {
    /// 人类可读的状态标签
    pub status: String,
    /// 可访问时的页面正文，供维护与 Cookie 检测使用
    pub body: Option<String>,
}

impl AvailabilityOutcome {
    fn available(response: FetchResponse) -> Self {
        Self {
            status: AVAILABLE.to_string(),
            body: Some(response.body),
        }
    }

    fn negative(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            body: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == AVAILABLE
    }
}

/// 可用性检测参数
#[derive(Debug, Clone)]
pub struct AvailabilityOptions {
    pub max_attempts: u32,
    pub max_redirects: u32,
    pub timeout: Duration,
    pub confirm_timeout: Duration,
    pub retry: RetryPolicy,
    /// 503 `Retry-After` 的上限，与退避上限相互独立
    pub max_retry_after: Duration,
}

impl From<&AvailabilitySettings> for AvailabilityOptions {
    fn from(s: &AvailabilitySettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            max_redirects: s.max_redirects,
            timeout: Duration::from_secs(s.timeout_secs),
            confirm_timeout: Duration::from_secs(s.confirm_timeout_secs),
            retry: RetryPolicy::exponential(
                s.max_attempts.max(1),
                Duration::from_millis(s.initial_backoff_ms),
                Duration::from_millis(s.max_backoff_ms),
            ),
            max_retry_after: Duration::from_secs(s.max_retry_after_secs),
        }
    }
}

/// 站点可用性检测器
///
/// 每次尝试手动处理重定向；401/404 立即返回，503 遵循 `Retry-After`（仅受
/// `max_retry_after` 约束），其余 5xx 与传输错误按指数退避重试。
/// 重试耗尽后再发一次长超时的确认请求。
pub struct AvailabilityChecker {
    fetcher: Arc<dyn Fetcher>,
    options: AvailabilityOptions,
}

impl AvailabilityChecker {
    pub fn new(fetcher: Arc<dyn Fetcher>, options: AvailabilityOptions) -> Self {
        Self { fetcher, options }
    }

    /// 检测站点可用性
    ///
    /// # 参数
    ///
    /// * `url` - 完整网址
    /// * `cancel` - 取消信号
    ///
    /// # 返回值
    ///
    /// * `Ok(AvailabilityOutcome)` - 终态标签（以及可访问时的正文）
    /// * `Err(ResolveError::Cancelled)` - 被取消
    pub async fn check(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<AvailabilityOutcome, ResolveError> {
        let mut target = url.to_string();
        let mut attempts = 0;
        let mut redirects = 0;
        let mut last_reason = String::from("no response");

        while attempts < self.options.max_attempts {
            let request = FetchRequest::get(target.clone(), self.options.timeout).manual_redirects();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
                outcome = self.fetcher.fetch(&request) => outcome,
            };
            attempts += 1;

            let delay = match outcome {
                Ok(response) => match response.status_code {
                    200..=299 => return Ok(AvailabilityOutcome::available(response)),
                    300..=399 => match response.header("location") {
                        Some(location) => {
                            redirects += 1;
                            if redirects > self.options.max_redirects {
                                return Ok(AvailabilityOutcome::negative(TOO_MANY_REDIRECTS));
                            }
                            target = match resolve_url(&target, location) {
                                Ok(next) => next.to_string(),
                                Err(e) => {
                                    warn!("Invalid redirect {} from {}: {}", location, target, e);
                                    return Ok(AvailabilityOutcome::negative(format!(
                                        "http status {}",
                                        response.status_code
                                    )));
                                }
                            };
                            debug!("{} redirects to {}", url, target);
                            // redirects are bounded by max_redirects, not by attempts
                            attempts -= 1;
                            continue;
                        }
                        None => {
                            return Ok(AvailabilityOutcome::negative(format!(
                                "http status {}",
                                response.status_code
                            )))
                        }
                    },
                    401 => return Ok(AvailabilityOutcome::negative(NOT_AUTHORIZED)),
                    404 => return Ok(AvailabilityOutcome::negative(NOT_FOUND)),
                    503 => {
                        last_reason = "service unavailable".to_string();
                        response
                            .header("retry-after")
                            .and_then(parse_retry_after)
                            .map(|d| d.min(self.options.max_retry_after))
                            .unwrap_or_else(|| self.options.retry.calculate_backoff(attempts))
                    }
                    500..=599 => {
                        last_reason = format!("http status {}", response.status_code);
                        self.options.retry.calculate_backoff(attempts)
                    }
                    other => return Ok(AvailabilityOutcome::negative(format!("http status {}", other))),
                },
                Err(e) => {
                    last_reason = if e.is_timeout() {
                        "timeout".to_string()
                    } else {
                        "connection error".to_string()
                    };
                    debug!("Attempt {} on {} failed: {}", attempts, target, e);
                    self.options.retry.calculate_backoff(attempts)
                }
            };

            if attempts < self.options.max_attempts {
                sleep_or_cancel(delay, cancel).await?;
            }
        }

        self.confirm(&target, last_reason, cancel).await
    }

    /// 最后一次长超时确认，避免冷启动慢的站点被误判
    async fn confirm(
        &self,
        target: &str,
        last_reason: String,
        cancel: &CancellationToken,
    ) -> Result<AvailabilityOutcome, ResolveError> {
        let request = FetchRequest::get(target, self.options.confirm_timeout);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            outcome = self.fetcher.fetch(&request) => outcome,
        };
        match outcome {
            Ok(response) if response.is_success() => {
                debug!("{} answered the confirmation request", target);
                Ok(AvailabilityOutcome::available(response))
            }
            _ => Ok(AvailabilityOutcome::negative(format!(
                "exhausted retries ({})",
                last_reason
            ))),
        }
    }
}

/// 解析 `Retry-After`：秒数或 HTTP 日期
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    (at - Utc::now()).to_std().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::reqwest_engine::ReqwestEngine;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(max_attempts: u32) -> AvailabilityOptions {
        AvailabilityOptions {
            max_attempts,
            max_redirects: 2,
            timeout: Duration::from_secs(2),
            confirm_timeout: Duration::from_secs(2),
            retry: RetryPolicy::exponential(
                max_attempts,
                Duration::from_millis(10),
                Duration::from_millis(50),
            ),
            max_retry_after: Duration::from_secs(60),
        }
    }

    fn checker(max_attempts: u32) -> AvailabilityChecker {
        AvailabilityChecker::new(
            Arc::new(ReqwestEngine::new("sitescout-test").unwrap()),
            options(max_attempts),
        )
    }

    #[tokio::test]
    async fn test_available_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<title>Home</title>"))
            .mount(&server)
            .await;

        let outcome = checker(3).check(&server.uri(), &CancellationToken::new()).await.unwrap();
        assert!(outcome.is_available());
        assert_eq!(outcome.body.as_deref(), Some("<title>Home</title>"));
    }

    #[tokio::test]
    async fn test_not_found_after_exactly_one_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = checker(3).check(&server.uri(), &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.status, NOT_FOUND);
        assert!(outcome.body.is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_is_definitive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = checker(3).check(&server.uri(), &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.status, NOT_AUTHORIZED);
    }

    #[tokio::test]
    async fn test_redirect_is_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
            .mount(&server)
            .await;

        let outcome = checker(1)
            .check(&format!("{}/old", server.uri()), &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_available());
        assert_eq!(outcome.body.as_deref(), Some("moved here"));
    }

    #[tokio::test]
    async fn test_redirect_loop_is_capped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
            .mount(&server)
            .await;

        let outcome = checker(3)
            .check(&format!("{}/loop", server.uri()), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.status, TOO_MANY_REDIRECTS);
    }

    #[tokio::test]
    async fn test_503_then_recovers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let outcome = checker(3).check(&server.uri(), &CancellationToken::new()).await.unwrap();
        assert!(outcome.is_available());
    }

    #[tokio::test]
    async fn test_503_waits_for_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        // backoff ceiling is 50ms, the header still wins
        let started = std::time::Instant::now();
        let outcome = checker(3).check(&server.uri(), &CancellationToken::new()).await.unwrap();
        assert!(outcome.is_available());
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_retry_after_is_bounded_by_its_own_cap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "3600"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut opts = options(3);
        opts.max_retry_after = Duration::from_millis(200);
        let checker = AvailabilityChecker::new(
            Arc::new(ReqwestEngine::new("sitescout-test").unwrap()),
            opts,
        );

        let started = std::time::Instant::now();
        let outcome = checker.check(&server.uri(), &CancellationToken::new()).await.unwrap();
        assert!(outcome.is_available());
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_exhausted_retries_includes_reason() {
        let server = MockServer::start().await;
        // two attempts plus the confirmation request
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let outcome = checker(2).check(&server.uri(), &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.status, "exhausted retries (http status 500)");
    }

    #[tokio::test]
    async fn test_confirmation_rescues_slow_site() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("warm now"))
            .mount(&server)
            .await;

        let outcome = checker(2).check(&server.uri(), &CancellationToken::new()).await.unwrap();
        assert!(outcome.is_available());
    }

    #[tokio::test]
    async fn test_forbidden_returns_status_label() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = checker(3).check(&server.uri(), &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.status, "http status 403");
    }

    #[tokio::test]
    async fn test_cancel_aborts_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "3600"))
            .mount(&server)
            .await;

        let mut opts = options(3);
        opts.max_retry_after = Duration::from_secs(3600);
        let checker = AvailabilityChecker::new(
            Arc::new(ReqwestEngine::new("sitescout-test").unwrap()),
            opts,
        );
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), checker.check(&server.uri(), &token))
            .await
            .expect("cancellation must interrupt the backoff");
        assert_eq!(result, Err(ResolveError::Cancelled));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("soon"), None);
    }
}
