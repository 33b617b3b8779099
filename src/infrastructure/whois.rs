// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// WHOIS 端口
pub const WHOIS_PORT: u16 = 43;

/// 根注册服务器，用于查找顶级域的 WHOIS 服务器
const IANA_SERVER: &str = "whois.iana.org";

/// WHOIS 查询错误
#[derive(Error, Debug)]
pub enum WhoisError {
    #[error("connect error to {server}: {source}")]
    Connect {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io error with {server}: {source}")]
    Io {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("timeout talking to {0}")]
    Timeout(String),
    #[error("no whois server known for .{0}")]
    NoServer(String),
}

/// WHOIS 查询接口
#[async_trait]
pub trait WhoisLookup: Send + Sync {
    /// 查询域名的注册信息原文
    async fn query(&self, domain: &str) -> Result<String, WhoisError>;
}

/// 基于 TCP 43 端口的 WHOIS 客户端
///
/// 未固定服务器时，先向 IANA 查询顶级域的 `refer:` 服务器，再向其查询域名
pub struct WhoisClient {
    server: Option<(String, u16)>,
    timeout: Duration,
}

impl WhoisClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            server: None,
            timeout,
        }
    }

    /// 固定使用某个服务器
    pub fn with_server(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            server: Some((host.into(), port)),
            timeout,
        }
    }

    async fn referral_server(&self, tld: &str) -> Result<String, WhoisError> {
        let response = raw_query(IANA_SERVER, WHOIS_PORT, tld, self.timeout).await?;
        parse_referral(&response).ok_or_else(|| WhoisError::NoServer(tld.to_string()))
    }
}

#[async_trait]
impl WhoisLookup for WhoisClient {
    async fn query(&self, domain: &str) -> Result<String, WhoisError> {
        let (host, port) = match &self.server {
            Some((host, port)) => (host.clone(), *port),
            None => {
                let tld = domain.rsplit('.').next().unwrap_or(domain);
                (self.referral_server(tld).await?, WHOIS_PORT)
            }
        };
        debug!("WHOIS {} via {}:{}", domain, host, port);
        raw_query(&host, port, domain, self.timeout).await
    }
}

/// 执行一次 WHOIS 查询，每一步都有超时
pub async fn raw_query(
    server: &str,
    port: u16,
    query: &str,
    to: Duration,
) -> Result<String, WhoisError> {
    let mut stream = match timeout(to, TcpStream::connect((server, port))).await {
        Ok(Ok(s)) => s,
        Ok(Err(source)) => {
            return Err(WhoisError::Connect {
                server: server.to_string(),
                source,
            })
        }
        Err(_) => return Err(WhoisError::Timeout(server.to_string())),
    };

    let line = format!("{query}\r\n");
    timeout(to, stream.write_all(line.as_bytes()))
        .await
        .map_err(|_| WhoisError::Timeout(server.to_string()))?
        .map_err(|source| WhoisError::Io {
            server: server.to_string(),
            source,
        })?;

    let mut buf = Vec::new();
    timeout(to, stream.read_to_end(&mut buf))
        .await
        .map_err(|_| WhoisError::Timeout(server.to_string()))?
        .map_err(|source| WhoisError::Io {
            server: server.to_string(),
            source,
        })?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// 从 IANA 响应中取出 `refer:` 或 `whois:` 行的服务器
pub fn parse_referral(response: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if (key == "refer" || key == "whois") && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}
