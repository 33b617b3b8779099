// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// 外部查询服务错误
#[derive(Error, Debug)]
pub enum LookupError {
    /// 传输错误
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// 非成功状态码
    #[error("service returned status {0}")]
    Status(u16),
    /// 响应无法解析
    #[error("cannot decode response: {0}")]
    Decode(String),
}

impl LookupError {
    /// 超时、连接失败、429 与 5xx 视为瞬时故障
    pub fn is_transient(&self) -> bool {
        match self {
            LookupError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LookupError::Status(code) => *code == 429 || *code >= 500,
            LookupError::Decode(_) => false,
        }
    }
}

/// IP 元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpMetadata {
    /// IP地址
    pub ip: String,
    /// 服务是否报告成功
    pub success: bool,
    /// ISP
    pub isp: Option<String>,
    /// 组织
    pub org: Option<String>,
}

/// IP 元数据服务（ip-api 风格接口）
pub struct IpMetadataClient {
    /// API端点
    api_endpoint: String,
    /// HTTP客户端
    client: reqwest::Client,
}

impl IpMetadataClient {
    /// 使用自定义API端点创建服务实例
    pub fn with_endpoint(api_endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_endpoint: api_endpoint.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    /// 查询 IP 的 ISP 信息
    ///
    /// # 参数
    ///
    /// * `ip` - IP地址
    ///
    /// # 返回值
    ///
    /// * `Ok(IpMetadata)` - 元数据（`success` 为 false 表示服务没有该 IP 的数据）
    /// * `Err(LookupError)` - 请求失败
    pub async fn lookup(&self, ip: &IpAddr) -> Result<IpMetadata, LookupError> {
        let url = format!("{}/{}", self.api_endpoint, ip);
        debug!("Querying IP metadata: {}", url);

        let response = self
            .client
            .get(&url)
            .header("User-Agent", "sitescout/0.1.0")
            .send()
            .await?;

        if !response.status().is_success() {
            error!(
                "IP metadata service returned status {} for {}",
                response.status(),
                ip
            );
            return Err(LookupError::Status(response.status().as_u16()));
        }

        let api_response: IpApiResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))?;

        Ok(IpMetadata {
            ip: ip.to_string(),
            success: api_response.status.as_deref() == Some("success"),
            isp: api_response.isp.filter(|s| !s.trim().is_empty()),
            org: api_response.org.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// IP API 响应结构
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: Option<String>,
    isp: Option<String>,
    org: Option<String>,
}
