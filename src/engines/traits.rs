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

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 连接失败
    #[error("Connection error: {0}")]
    Connect(String),
    /// 浏览器错误
    #[error("Browser error: {0}")]
    Browser(String),
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl EngineError {
    /// 判断错误是否可重试
    ///
    /// # 返回值
    ///
    /// 如果错误是可重试的则返回true，否则返回false
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::RequestFailed(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            EngineError::Timeout | EngineError::Connect(_) | EngineError::Browser(_) => true,
            EngineError::Other(_) => false,
        }
    }

    /// 是否为超时错误
    pub fn is_timeout(&self) -> bool {
        match self {
            EngineError::RequestFailed(e) => e.is_timeout(),
            EngineError::Timeout => true,
            _ => false,
        }
    }
}

/// HTTP 方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Head,
}

/// 抓取请求
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// 目标URL
    pub url: String,
    /// 请求方法
    pub method: Method,
    /// 请求头
    pub headers: HashMap<String, String>,
    /// 超时时间
    pub timeout: Duration,
    /// 是否自动跟随重定向
    pub follow_redirects: bool,
}

impl FetchRequest {
    /// 以默认选项构造 GET 请求
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            headers: HashMap::new(),
            timeout,
            follow_redirects: true,
        }
    }

    /// 关闭自动重定向
    pub fn manual_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

/// 抓取响应
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    /// HTTP状态码
    pub status_code: u16,
    /// 最终URL（跟随重定向后）
    pub final_url: String,
    /// 响应头，键为小写，同名多值以 ", " 连接
    pub headers: HashMap<String, String>,
    /// 响应内容
    pub body: String,
}

impl FetchResponse {
    /// 读取响应头（大小写不敏感）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// HTTP 抓取能力
///
/// 由外部抓取引擎提供，解析器只依赖此特质，测试中可替换为假实现
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// 执行HTTP抓取
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError>;

    /// 获取引擎名称
    fn name(&self) -> &'static str;
}

/// 拦截动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptAction {
    /// 以 "blocked by client" 终止请求
    Abort,
    /// 放行
    Continue,
}

/// 请求拦截规则：URL 子串谓词与对应动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptRule {
    pub url_contains: String,
    pub action: InterceptAction,
}

impl InterceptRule {
    /// 丢弃 URL 中包含给定子串的请求
    pub fn block(url_contains: impl Into<String>) -> Self {
        Self {
            url_contains: url_contains.into(),
            action: InterceptAction::Abort,
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        url.contains(&self.url_contains)
    }

    /// 返回第一条命中规则的动作，未命中时放行
    pub fn decide(rules: &[InterceptRule], url: &str) -> InterceptAction {
        rules
            .iter()
            .find(|r| r.matches(url))
            .map(|r| r.action)
            .unwrap_or(InterceptAction::Continue)
    }
}

/// 页面交互动作
#[derive(Debug, Clone, PartialEq)]
pub enum PageAction {
    /// 若元素在超时内出现则点击，否则忽略
    ClickIfPresent { selector: String, timeout: Duration },
    /// 滚动指定容器直到高度不再变化或达到最大次数
    ScrollFeed { selector: String, max_depth: u32 },
    /// 等待
    Wait { milliseconds: u64 },
}

/// 浏览器渲染请求
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: String,
    pub timeout: Duration,
    pub intercept: Vec<InterceptRule>,
    pub actions: Vec<PageAction>,
    /// 页面加载并完成动作后求值的脚本
    pub evaluate: Option<String>,
}

impl RenderRequest {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            intercept: Vec::new(),
            actions: Vec::new(),
            evaluate: None,
        }
    }
}

/// 渲染结果
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    pub final_url: String,
    pub html: String,
    pub user_agent: String,
    pub platform: String,
    /// `evaluate` 脚本的返回值
    pub evaluated: Option<serde_json::Value>,
}

impl RenderedPage {
    /// 由浏览器环境合成的最小响应头
    pub fn synthetic_headers(&self) -> HashMap<String, String> {
        HashMap::from([
            ("user-agent".to_string(), self.user_agent.clone()),
            ("platform".to_string(), self.platform.clone()),
        ])
    }
}

/// 无头浏览器能力
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// 渲染页面，执行交互动作并返回渲染后的标记
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, EngineError>;
}
