// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::resolution::ResolveError;
use crate::engines::traits::{FetchRequest, Fetcher};
use crate::utils::url_utils::{explicit_scheme, normalize_domain};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 协议解析器
///
/// 输入已带协议时原样返回；否则先探测 https，再回退到 http
pub struct ProtocolResolver {
    fetcher: Arc<dyn Fetcher>,
    timeout: Duration,
}

impl ProtocolResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    /// 解析协议
    ///
    /// # 参数
    ///
    /// * `domain_or_url` - 域名或完整网址
    /// * `cancel` - 取消信号
    ///
    /// # 返回值
    ///
    /// * `Ok("https" | "http")` - 显式协议，或第一个返回成功状态的探测协议
    /// * `Err(ResolveError::ProtocolUndetermined)` - 两种协议都没有成功响应
    pub async fn resolve(
        &self,
        domain_or_url: &str,
        cancel: &CancellationToken,
    ) -> Result<&'static str, ResolveError> {
        if let Some(scheme) = explicit_scheme(domain_or_url) {
            return Ok(scheme);
        }

        let domain = normalize_domain(domain_or_url);
        if domain.is_empty() {
            return Err(ResolveError::InvalidInput(domain_or_url.to_string()));
        }

        for scheme in ["https", "http"] {
            let request = FetchRequest::get(format!("{}://{}", scheme, domain), self.timeout);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
                outcome = self.fetcher.fetch(&request) => outcome,
            };
            match outcome {
                Ok(response) if response.is_success() => {
                    debug!("{} answers over {}", domain, scheme);
                    return Ok(scheme);
                }
                Ok(response) => {
                    debug!("{}://{} returned {}", scheme, domain, response.status_code)
                }
                Err(e) => debug!("{}://{} failed: {}", scheme, domain, e),
            }
        }

        Err(ResolveError::ProtocolUndetermined(domain))
    }
}
