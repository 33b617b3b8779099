// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 单元测试共用的假实现

use crate::engines::traits::{
    BrowserEngine, EngineError, FetchRequest, FetchResponse, Fetcher, RenderRequest, RenderedPage,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Clone)]
enum Scripted {
    Response(FetchResponse),
    Timeout,
    Refused,
}

/// 按 URL 预置响应的抓取器；队列只剩最后一个响应时重复返回它
#[derive(Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, url: &str, item: Scripted) {
        self.routes
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(item);
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) -> &Self {
        self.respond_with_headers(url, status, body, &[])
    }

    pub fn respond_with_headers(
        &self,
        url: &str,
        status: u16,
        body: &str,
        headers: &[(&str, &str)],
    ) -> &Self {
        self.push(
            url,
            Scripted::Response(FetchResponse {
                status_code: status,
                final_url: url.to_string(),
                headers: headers
                    .iter()
                    .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                    .collect(),
                body: body.to_string(),
            }),
        );
        self
    }

    pub fn time_out(&self, url: &str) -> &Self {
        self.push(url, Scripted::Timeout);
        self
    }

    pub fn refuse(&self, url: &str) -> &Self {
        self.push(url, Scripted::Refused);
        self
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|u| u.as_str() == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError> {
        self.calls.lock().push(request.url.clone());
        let next = {
            let mut routes = self.routes.lock();
            match routes.get_mut(&request.url) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match next {
            Some(Scripted::Response(r)) => Ok(r),
            Some(Scripted::Timeout) => Err(EngineError::Timeout),
            Some(Scripted::Refused) | None => {
                Err(EngineError::Connect(format!("connection refused: {}", request.url)))
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// 返回固定渲染结果的浏览器，并记录收到的请求
#[derive(Default)]
pub struct FakeBrowser {
    pub page: Option<RenderedPage>,
    pub requests: Mutex<Vec<RenderRequest>>,
}

impl FakeBrowser {
    pub fn rendering(page: RenderedPage) -> Self {
        Self {
            page: Some(page),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn render_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl BrowserEngine for FakeBrowser {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, EngineError> {
        self.requests.lock().push(request.clone());
        self.page
            .clone()
            .ok_or_else(|| EngineError::Browser("no browser available".into()))
    }
}
