// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::infrastructure::ip_metadata::LookupError;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

/// 被动情报服务返回的主机信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostIntel {
    pub hostnames: Vec<String>,
    pub isp: Option<String>,
    pub org: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HostResponse {
    #[serde(default)]
    hostnames: Vec<String>,
    isp: Option<String>,
    org: Option<String>,
}

/// 主机情报客户端（Shodan 风格的 `/shodan/host/{ip}` 接口）
pub struct HostIntelClient {
    api_endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl HostIntelClient {
    pub fn new(api_endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_endpoint: api_endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    /// 查询 IP 关联的主机名
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(HostIntel))` - 服务有该 IP 的记录
    /// * `Ok(None)` - 服务没有该 IP 的记录（404）
    /// * `Err(LookupError)` - 请求失败
    pub async fn host(&self, ip: &IpAddr) -> Result<Option<HostIntel>, LookupError> {
        let url = format!("{}/shodan/host/{}", self.api_endpoint, ip);
        debug!("Querying host intel for {}", ip);

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        match response.status().as_u16() {
            404 => return Ok(None),
            s if !(200..300).contains(&s) => return Err(LookupError::Status(s)),
            _ => {}
        }

        let body: HostResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))?;
        Ok(Some(HostIntel {
            hostnames: body.hostnames,
            isp: body.isp,
            org: body.org,
        }))
    }
}
