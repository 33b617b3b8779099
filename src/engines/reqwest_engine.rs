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

use crate::engines::traits::{EngineError, FetchRequest, FetchResponse, Fetcher, Method};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use std::collections::HashMap;

/// 抓取引擎
///
/// 基于reqwest实现的基本HTTP抓取引擎。
/// 预先构建两个客户端：一个自动跟随重定向，一个把 3xx 原样返回给调用方。
pub struct ReqwestEngine {
    following: reqwest::Client,
    manual: reqwest::Client,
}

impl ReqwestEngine {
    /// 创建抓取引擎
    ///
    /// # 参数
    ///
    /// * `user_agent` - 所有请求使用的 User-Agent
    ///
    /// # 返回值
    ///
    /// * `Ok(ReqwestEngine)` - 构建成功
    /// * `Err(EngineError)` - TLS 后端初始化失败
    pub fn new(user_agent: &str) -> Result<Self, EngineError> {
        let following = reqwest::Client::builder()
            .user_agent(user_agent)
            .cookie_store(true)
            .redirect(Policy::limited(10))
            .build()?;
        let manual = reqwest::Client::builder()
            .user_agent(user_agent)
            .cookie_store(true)
            .redirect(Policy::none())
            .build()?;
        Ok(Self { following, manual })
    }
}

#[async_trait]
impl Fetcher for ReqwestEngine {
    /// 执行HTTP抓取
    ///
    /// # 参数
    ///
    /// * `request` - 抓取请求
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchResponse)` - 抓取响应（任何状态码都视为成功返回）
    /// * `Err(EngineError)` - 传输层错误
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, EngineError> {
        let mut headers = HeaderMap::new();
        for (k, v) in &request.headers {
            if let (Ok(k), Ok(v)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                headers.insert(k, v);
            }
        }

        let client = if request.follow_redirects {
            &self.following
        } else {
            &self.manual
        };
        let builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Head => client.head(&request.url),
        };

        let response = builder
            .headers(headers)
            .timeout(request.timeout)
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();

        let mut response_headers: HashMap<String, String> = HashMap::new();
        for (k, v) in response.headers() {
            if let Ok(v_str) = v.to_str() {
                response_headers
                    .entry(k.as_str().to_ascii_lowercase())
                    .and_modify(|existing| {
                        existing.push_str(", ");
                        existing.push_str(v_str);
                    })
                    .or_insert_with(|| v_str.to_string());
            }
        }

        let body = match request.method {
            Method::Head => String::new(),
            Method::Get => response.text().await?,
        };

        Ok(FetchResponse {
            status_code,
            final_url,
            headers: response_headers,
            body,
        })
    }

    /// 获取引擎名称
    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
