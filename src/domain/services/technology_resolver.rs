// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::tables::LookupTables;
use crate::domain::services::resolution::OTHER_PLATFORM;
use crate::engines::traits::{BrowserEngine, FetchRequest, Fetcher, InterceptRule, RenderRequest};
use crate::utils::url_utils::resolve_url;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

static SCRIPT_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<script[^>]+src\s*=\s*["']([^"']+)["']"#)
        .expect("Failed to compile script src regex")
});

/// 动态分析时丢弃的噪声请求
const NOISE_PATTERN: &str = "wp-json";

/// 技术识别的时间与规模参数
#[derive(Debug, Clone)]
pub struct TechnologyOptions {
    pub page_timeout: Duration,
    pub script_timeout: Duration,
    pub script_limit: usize,
    pub browser_timeout: Duration,
}

impl Default for TechnologyOptions {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(15),
            script_timeout: Duration::from_secs(5),
            script_limit: 5,
            browser_timeout: Duration::from_secs(30),
        }
    }
}

/// 网站平台识别器
///
/// 先做静态分析（正文、外部脚本、响应头、Cookie），没有结果时再用无头浏览器渲染。
/// 永远不返回错误，未识别时返回 `"Other"`。
pub struct TechnologyResolver {
    fetcher: Arc<dyn Fetcher>,
    browser: Option<Arc<dyn BrowserEngine>>,
    tables: Arc<LookupTables>,
    options: TechnologyOptions,
}

impl TechnologyResolver {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        browser: Option<Arc<dyn BrowserEngine>>,
        tables: Arc<LookupTables>,
        options: TechnologyOptions,
    ) -> Self {
        Self {
            fetcher,
            browser,
            tables,
            options,
        }
    }

    /// 识别网站平台
    ///
    /// # 参数
    ///
    /// * `url` - 网站首页地址（含协议）
    /// * `cancel` - 取消信号
    ///
    /// # 返回值
    ///
    /// 平台名，未识别时为 `"Other"`
    pub async fn resolve(&self, url: &str, cancel: &CancellationToken) -> String {
        let found = tokio::select! {
            biased;
            _ = cancel.cancelled() => return OTHER_PLATFORM.to_string(),
            found = self.static_phase(url) => found,
        };
        if let Some(name) = found {
            debug!("{} identified statically as {}", url, name);
            return name;
        }

        let found = tokio::select! {
            biased;
            _ = cancel.cancelled() => return OTHER_PLATFORM.to_string(),
            found = self.dynamic_phase(url) => found,
        };
        match found {
            Some(name) => {
                debug!("{} identified after rendering as {}", url, name);
                name
            }
            None => OTHER_PLATFORM.to_string(),
        }
    }

    async fn static_phase(&self, url: &str) -> Option<String> {
        let response = match self
            .fetcher
            .fetch(&FetchRequest::get(url, self.options.page_timeout))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Static analysis of {} failed: {}", url, e);
                return None;
            }
        };

        let base = if response.final_url.is_empty() {
            url
        } else {
            response.final_url.as_str()
        };
        let mut text = response.body.clone();
        for script in self.fetch_scripts(base, &response.body).await {
            text.push('\n');
            text.push_str(&script);
        }

        let header_values: Vec<&str> = ["server", "x-powered-by"]
            .iter()
            .filter_map(|h| response.header(h))
            .collect();
        self.identify(&text, &header_values, response.header("set-cookie"))
    }

    /// 抓取页面引用的外部脚本；失败的脚本直接忽略
    async fn fetch_scripts(&self, base: &str, body: &str) -> Vec<String> {
        let sources = extract_script_sources(body, self.options.script_limit);
        let requests = sources
            .iter()
            .filter_map(|src| resolve_url(base, src).ok())
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .map(|u| FetchRequest::get(u.to_string(), self.options.script_timeout))
            .collect::<Vec<_>>();

        join_all(requests.iter().map(|r| self.fetcher.fetch(r)))
            .await
            .into_iter()
            .filter_map(|r| r.ok())
            .filter(|r| r.is_success())
            .map(|r| r.body)
            .collect()
    }

    async fn dynamic_phase(&self, url: &str) -> Option<String> {
        let browser = self.browser.as_ref()?;
        let mut request = RenderRequest::new(url, self.options.browser_timeout);
        request.intercept.push(InterceptRule::block(NOISE_PATTERN));

        match browser.render(&request).await {
            Ok(page) => {
                let headers = page.synthetic_headers();
                let values: Vec<&str> = headers.values().map(String::as_str).collect();
                self.identify(&page.html, &values, None)
            }
            Err(e) => {
                warn!("Dynamic analysis of {} failed: {}", url, e);
                None
            }
        }
    }

    /// 依次匹配正文、响应头与 Cookie，首个命中者胜出，再应用细化规则
    pub fn identify(&self, text: &str, header_values: &[&str], cookie: Option<&str>) -> Option<String> {
        let platforms = &self.tables.platforms;
        let matched = platforms
            .iter()
            .find(|sig| sig.is_match(text))
            .or_else(|| {
                platforms
                    .iter()
                    .find(|sig| header_values.iter().any(|v| sig.is_match(v)))
            })
            .or_else(|| {
                let cookie = cookie?;
                platforms.iter().find(|sig| sig.is_match(cookie))
            })?;

        Some(self.refine(&matched.name, text))
    }

    fn refine(&self, generic: &str, text: &str) -> String {
        self.tables
            .refinements
            .iter()
            .find(|r| r.generic == generic && r.pattern.is_match(text))
            .map(|r| r.specific.clone())
            .unwrap_or_else(|| generic.to_string())
    }
}

/// 提取 `<script src>` 地址，最多 `limit` 个
pub fn extract_script_sources(html: &str, limit: usize) -> Vec<String> {
    SCRIPT_SRC
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .take(limit)
        .collect()
}
