// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// DNS 查询错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    /// 域名存在但没有对应记录（或域名不存在）
    #[error("no records found")]
    NoRecords,
    /// 查询失败（超时、服务器错误）
    #[error("lookup failed: {0}")]
    Lookup(String),
}

impl From<ResolveError> for DnsError {
    fn from(e: ResolveError) -> Self {
        match e.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => DnsError::NoRecords,
            _ => DnsError::Lookup(e.to_string()),
        }
    }
}

/// DNS 查询接口
#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// 解析主机地址
    async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, DnsError>;

    /// 查询权威名称服务器，返回原始主机名（可能带末尾的点）
    async fn lookup_ns(&self, domain: &str) -> Result<Vec<String>, DnsError>;
}

/// 基于 hickory 的异步解析器
pub struct HickoryDns {
    resolver: TokioAsyncResolver,
}

impl HickoryDns {
    /// 使用系统配置创建，读取失败时回退到公共解析器
    pub fn new(timeout: Duration) -> Self {
        let (config, mut opts) = match hickory_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                debug!("System resolver config unavailable ({}), using defaults", e);
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.timeout = timeout;
        opts.attempts = 2;
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

#[async_trait]
impl DnsLookup for HickoryDns {
    async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        let response = self.resolver.lookup_ip(host).await?;
        let ips: Vec<IpAddr> = response.iter().collect();
        if ips.is_empty() {
            return Err(DnsError::NoRecords);
        }
        Ok(ips)
    }

    async fn lookup_ns(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        let response = self.resolver.ns_lookup(domain).await?;
        let names: Vec<String> = response.iter().map(|ns| ns.0.to_utf8()).collect();
        debug!("{} nameservers for {}: {:?}", names.len(), domain, names);
        if names.is_empty() {
            return Err(DnsError::NoRecords);
        }
        Ok(names)
    }
}
