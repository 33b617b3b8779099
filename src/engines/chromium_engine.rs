// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::traits::{
    BrowserEngine, EngineError, InterceptAction, InterceptRule, PageAction, RenderRequest,
    RenderedPage,
};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::ErrorReason;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::OnceCell;

// Global browser instance to avoid re-launching Chrome on every request.
static BROWSER_INSTANCE: OnceCell<Browser> = OnceCell::const_new();

const SCROLL_INITIAL_WAIT_MS: u64 = 100;
const SCROLL_MAX_WAIT_MS: u64 = 2000;

/// 获取或初始化共享的浏览器实例
///
/// 设置了 `CHROMIUM_REMOTE_DEBUGGING_URL` 时连接远程实例，否则本地启动
pub async fn get_browser() -> Result<&'static Browser, EngineError> {
    BROWSER_INSTANCE
        .get_or_try_init(|| async {
            let (browser, mut handler) = match std::env::var("CHROMIUM_REMOTE_DEBUGGING_URL") {
                Ok(url) => {
                    tracing::info!("Connecting to remote Chrome instance at: {}", url);
                    Browser::connect(&url).await.map_err(|e| {
                        EngineError::Browser(format!("Failed to connect to remote Chrome: {}", e))
                    })?
                }
                Err(_) => {
                    let config = BrowserConfig::builder()
                        .no_sandbox()
                        .request_timeout(Duration::from_secs(30))
                        .arg("--disable-gpu")
                        .arg("--disable-dev-shm-usage")
                        .build()
                        .map_err(EngineError::Browser)?;
                    Browser::launch(config)
                        .await
                        .map_err(|e| EngineError::Browser(e.to_string()))?
                }
            };

            tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            Ok(browser)
        })
        .await
}

/// 基于chromiumoxide的无头浏览器引擎
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumEngine;

impl ChromiumEngine {
    /// 启用 Fetch 域并按规则放行或丢弃每个暂停的请求
    async fn install_interception(page: &Page, rules: Vec<InterceptRule>) -> Result<(), EngineError> {
        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?;
        page.execute(EnableParams::default())
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?;

        let page = page.clone();
        tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let outcome = match InterceptRule::decide(&rules, &event.request.url) {
                    InterceptAction::Abort => {
                        tracing::trace!("Blocking request {}", event.request.url);
                        page.execute(FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(|_| ())
                    }
                    InterceptAction::Continue => page
                        .execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ()),
                };
                if outcome.is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    async fn run_action(page: &Page, action: &PageAction) -> Result<(), EngineError> {
        match action {
            PageAction::Wait { milliseconds } => {
                tokio::time::sleep(Duration::from_millis(*milliseconds)).await;
            }
            PageAction::ClickIfPresent { selector, timeout } => {
                if let Ok(Ok(element)) = tokio::time::timeout(*timeout, page.find_element(selector)).await {
                    if let Err(e) = element.click().await {
                        tracing::debug!("Click on {} failed: {}", selector, e);
                    }
                }
            }
            PageAction::ScrollFeed { selector, max_depth } => {
                let script = format!(
                    "(() => {{ const el = document.querySelector({sel:?}); if (!el) return -1; \
                     el.scrollBy(0, el.scrollHeight); return el.scrollHeight; }})()",
                    sel = selector
                );
                let mut wait = SCROLL_INITIAL_WAIT_MS;
                let mut last_height = 0_i64;
                for _ in 0..*max_depth {
                    let height: i64 = page
                        .evaluate(script.as_str())
                        .await
                        .map_err(|e| EngineError::Browser(format!("Scroll failed: {}", e)))?
                        .into_value()
                        .unwrap_or(-1);
                    if height < 0 || height == last_height {
                        break;
                    }
                    last_height = height;
                    tokio::time::sleep(Duration::from_millis(wait)).await;
                    wait = ((wait as f64 * 1.5) as u64).min(SCROLL_MAX_WAIT_MS);
                }
            }
        }
        Ok(())
    }

    async fn render_page(page: &Page, request: &RenderRequest) -> Result<RenderedPage, EngineError> {
        if !request.intercept.is_empty() {
            Self::install_interception(page, request.intercept.clone()).await?;
        }

        page.goto(&request.url)
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?;

        for action in &request.actions {
            Self::run_action(page, action).await?;
        }

        let html = page
            .content()
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| request.url.clone());
        let user_agent = evaluate_string(page, "navigator.userAgent").await;
        let platform = evaluate_string(page, "navigator.platform").await;

        let evaluated = match &request.evaluate {
            Some(script) => Some(
                page.evaluate(script.as_str())
                    .await
                    .map_err(|e| EngineError::Browser(format!("Evaluate failed: {}", e)))?
                    .into_value::<serde_json::Value>()
                    .map_err(|e| EngineError::Browser(e.to_string()))?,
            ),
            None => None,
        };

        Ok(RenderedPage {
            final_url,
            html,
            user_agent,
            platform,
            evaluated,
        })
    }
}

async fn evaluate_string(page: &Page, expression: &str) -> String {
    match page.evaluate(expression).await {
        Ok(value) => value.into_value::<String>().unwrap_or_default(),
        Err(_) => String::new(),
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    /// 渲染页面
    ///
    /// # 参数
    ///
    /// * `request` - 渲染请求
    ///
    /// # 返回值
    ///
    /// * `Ok(RenderedPage)` - 渲染结果
    /// * `Err(EngineError)` - 浏览器错误或超时
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, EngineError> {
        let browser = get_browser().await?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| EngineError::Browser(e.to_string()))?;

        let result = tokio::time::timeout(request.timeout, Self::render_page(&page, request))
            .await
            .unwrap_or(Err(EngineError::Timeout));

        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page: {}", e);
        }
        result
    }
}
