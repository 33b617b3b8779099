// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::HostingSettings;
use crate::config::tables::LookupTables;
use crate::domain::models::entry::ResolvedDomain;
use crate::domain::services::resolution::{Resolution, ResolveError, UNKNOWN_PROVIDER};
use crate::infrastructure::curation_log::UnmatchedNameserverLog;
use crate::infrastructure::dns::{DnsError, DnsLookup};
use crate::infrastructure::host_intel::HostIntelClient;
use crate::infrastructure::ip_metadata::{IpMetadataClient, LookupError};
use crate::infrastructure::whois::{WhoisClient, WhoisError, WhoisLookup};
use crate::utils::retry_policy::{sleep_or_cancel, RetryPolicy};
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// WHOIS 文本中的托管商关键字（小写）→ 托管商名
const WHOIS_KEYWORDS: &[(&str, &str)] = &[
    ("aruba", "Aruba"),
    ("register.it", "Register.it"),
    ("godaddy", "GoDaddy"),
    ("ovh", "OVH"),
    ("siteground", "SiteGround"),
    ("ionos", "IONOS"),
    ("1&1", "IONOS"),
    ("hostinger", "Hostinger"),
    ("cloudflare", "Cloudflare"),
    ("netsons", "Netsons"),
    ("keliweb", "Keliweb"),
    ("serverplan", "Serverplan"),
    ("tophost", "TopHost"),
    ("hetzner", "Hetzner"),
    ("amazon", "Amazon Web Services"),
    ("google", "Google"),
    ("namecheap", "Namecheap"),
    ("wix", "Wix"),
];

/// 未匹配的名称服务器（原始值，归一化值）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedNs {
    pub raw: String,
    pub normalized: String,
}

/// 单个阶段的一次尝试
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostingAttempt {
    pub resolution: Resolution<String>,
    /// 本次尝试中没有命中托管商表的名称服务器
    pub unmatched: Vec<UnmatchedNs>,
}

impl From<Resolution<String>> for HostingAttempt {
    fn from(resolution: Resolution<String>) -> Self {
        Self {
            resolution,
            unmatched: Vec::new(),
        }
    }
}

/// 托管商解析的一个阶段
#[async_trait]
pub trait HostingStage: Send + Sync {
    /// 阶段名，用于日志与指标
    fn name(&self) -> &'static str;

    async fn attempt(&self, domain: &ResolvedDomain) -> HostingAttempt;
}

/// 托管商解析器
///
/// 按顺序执行各阶段，首个返回 `Found` 的阶段胜出；全部落空时返回 `"Unknown"`。
/// 瞬时错误在阶段内按退避策略重试，致命错误直接跳到下一阶段。
pub struct HostingResolver {
    stages: Vec<Arc<dyn HostingStage>>,
    retry: RetryPolicy,
    curation: Option<Arc<UnmatchedNameserverLog>>,
}

impl HostingResolver {
    pub fn new(stages: Vec<Arc<dyn HostingStage>>, retry: RetryPolicy) -> Self {
        Self {
            stages,
            retry,
            curation: None,
        }
    }

    /// 记录未匹配的名称服务器
    pub fn with_curation_log(mut self, log: Arc<UnmatchedNameserverLog>) -> Self {
        self.curation = Some(log);
        self
    }

    /// 按配置组装默认的四阶段级联：ISP → 名称服务器 → WHOIS → 主机情报
    pub fn from_settings(
        settings: &HostingSettings,
        tables: Arc<LookupTables>,
        dns: Arc<dyn DnsLookup>,
    ) -> Self {
        let lookup_timeout = Duration::from_secs(settings.lookup_timeout_secs);
        let whois_timeout = Duration::from_secs(settings.whois_timeout_secs);
        let whois: Arc<dyn WhoisLookup> = match &settings.whois_server {
            Some(server) => Arc::new(WhoisClient::with_server(
                server.clone(),
                crate::infrastructure::whois::WHOIS_PORT,
                whois_timeout,
            )),
            None => Arc::new(WhoisClient::new(whois_timeout)),
        };
        let intel = settings
            .intel_api_key
            .as_ref()
            .filter(|k| !k.trim().is_empty())
            .map(|key| {
                Arc::new(HostIntelClient::new(
                    settings.intel_endpoint.clone(),
                    key.clone(),
                    lookup_timeout,
                ))
            });

        let stages: Vec<Arc<dyn HostingStage>> = vec![
            Arc::new(IpIspStage::new(
                dns.clone(),
                Arc::new(IpMetadataClient::with_endpoint(
                    settings.ip_metadata_endpoint.clone(),
                    lookup_timeout,
                )),
            )),
            Arc::new(NameserverStage::new(dns.clone(), tables)),
            Arc::new(WhoisStage::new(whois)),
            Arc::new(PassiveIntelStage::new(dns, intel)),
        ];

        Self::new(
            stages,
            RetryPolicy::exponential(
                settings.stage_attempts.max(1),
                Duration::from_millis(500),
                Duration::from_secs(4),
            ),
        )
    }

    /// 解析托管商
    ///
    /// # 参数
    ///
    /// * `domain` - 归一化域名
    /// * `cancel` - 取消信号
    ///
    /// # 返回值
    ///
    /// * `Ok(String)` - 托管商名，或 `"Unknown"`
    /// * `Err(ResolveError::Cancelled)` - 被取消
    pub async fn resolve(
        &self,
        domain: &ResolvedDomain,
        cancel: &CancellationToken,
    ) -> Result<String, ResolveError> {
        let mut unmatched = Vec::new();
        let mut whois_guess = None;
        let mut found = None;

        for stage in &self.stages {
            let attempt = self.run_stage(stage.as_ref(), domain, cancel).await?;
            unmatched.extend(attempt.unmatched);
            if let Resolution::Found(provider) = attempt.resolution {
                if stage.name() == WhoisStage::NAME {
                    whois_guess = Some(provider.clone());
                }
                found = Some(provider);
                break;
            }
        }

        let provider = found.unwrap_or_else(|| UNKNOWN_PROVIDER.to_string());
        if !unmatched.is_empty() {
            // only a WHOIS hit counts as a guess
            let guess = whois_guess.unwrap_or_default();
            self.log_unmatched(domain, &unmatched, &guess);
        }
        Ok(provider)
    }

    async fn run_stage(
        &self,
        stage: &dyn HostingStage,
        domain: &ResolvedDomain,
        cancel: &CancellationToken,
    ) -> Result<HostingAttempt, ResolveError> {
        let mut unmatched = Vec::new();
        let mut attempt_no = 0;
        loop {
            attempt_no += 1;
            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
                attempt = stage.attempt(domain) => attempt,
            };
            metrics::counter!(
                "hosting_stage_total",
                "stage" => stage.name(),
                "outcome" => attempt.resolution.outcome()
            )
            .increment(1);
            debug!("Hosting stage {} for {}: {}", stage.name(), domain, attempt.resolution);

            for ns in attempt.unmatched {
                if !unmatched.contains(&ns) {
                    unmatched.push(ns);
                }
            }

            match attempt.resolution {
                Resolution::Transient(ref e) if self.retry.should_retry(attempt_no) => {
                    let delay = self.retry.calculate_backoff(attempt_no);
                    debug!(
                        "Hosting stage {} transient failure for {} ({}), retrying in {:?}",
                        stage.name(),
                        domain,
                        e,
                        delay
                    );
                    sleep_or_cancel(delay, cancel).await?;
                }
                resolution => {
                    if let Resolution::Fatal(ref e) = resolution {
                        warn!("Hosting stage {} skipped for {}: {}", stage.name(), domain, e);
                    }
                    return Ok(HostingAttempt {
                        resolution,
                        unmatched,
                    });
                }
            }
        }
    }

    fn log_unmatched(&self, domain: &ResolvedDomain, unmatched: &[UnmatchedNs], guess: &str) {
        for ns in unmatched {
            info!(
                domain = %domain,
                raw = %ns.raw,
                normalized = %ns.normalized,
                whois_guess = %guess,
                "Unmatched nameserver"
            );
            if let Some(log) = &self.curation {
                if let Err(e) = log.record(domain.as_str(), &ns.raw, &ns.normalized, guess) {
                    warn!("Failed to append unmatched nameserver log: {}", e);
                }
            }
        }
    }
}

/// 名称服务器归一化：去掉末尾的点、转小写、只保留最后两个标签
pub fn normalize_nameserver(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = trimmed.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= 2 {
        labels.join(".")
    } else {
        labels[labels.len() - 2..].join(".")
    }
}

fn dns_failure(e: DnsError) -> Resolution<String> {
    match e {
        DnsError::NoRecords => Resolution::NotFound,
        DnsError::Lookup(e) => Resolution::Transient(e),
    }
}

fn lookup_failure(e: LookupError) -> Resolution<String> {
    if e.is_transient() {
        Resolution::Transient(e.to_string())
    } else {
        Resolution::Fatal(e.to_string())
    }
}

async fn first_ip(dns: &dyn DnsLookup, domain: &ResolvedDomain) -> Result<IpAddr, Resolution<String>> {
    let ips = dns.lookup_ip(domain.as_str()).await.map_err(dns_failure)?;
    ips.into_iter().next().ok_or(Resolution::NotFound)
}

/// 阶段一：解析 IP 后查询 ISP
pub struct IpIspStage {
    dns: Arc<dyn DnsLookup>,
    client: Arc<IpMetadataClient>,
}

impl IpIspStage {
    pub fn new(dns: Arc<dyn DnsLookup>, client: Arc<IpMetadataClient>) -> Self {
        Self { dns, client }
    }
}

#[async_trait]
impl HostingStage for IpIspStage {
    fn name(&self) -> &'static str {
        "ip_isp"
    }

    async fn attempt(&self, domain: &ResolvedDomain) -> HostingAttempt {
        let ip = match first_ip(self.dns.as_ref(), domain).await {
            Ok(ip) => ip,
            Err(resolution) => return resolution.into(),
        };
        match self.client.lookup(&ip).await {
            Ok(meta) if meta.success => match meta.isp {
                Some(isp) => Resolution::Found(isp),
                None => Resolution::NotFound,
            },
            Ok(_) => Resolution::NotFound,
            Err(e) => lookup_failure(e),
        }
        .into()
    }
}

/// 阶段二：名称服务器匹配托管商表
pub struct NameserverStage {
    dns: Arc<dyn DnsLookup>,
    tables: Arc<LookupTables>,
}

impl NameserverStage {
    pub fn new(dns: Arc<dyn DnsLookup>, tables: Arc<LookupTables>) -> Self {
        Self { dns, tables }
    }
}

#[async_trait]
impl HostingStage for NameserverStage {
    fn name(&self) -> &'static str {
        "nameserver"
    }

    async fn attempt(&self, domain: &ResolvedDomain) -> HostingAttempt {
        let nameservers = match self.dns.lookup_ns(domain.as_str()).await {
            Ok(ns) => ns,
            Err(e) => return dns_failure(e).into(),
        };

        let mut unmatched: Vec<UnmatchedNs> = Vec::new();
        let mut found = None;
        for raw in nameservers {
            let normalized = normalize_nameserver(&raw);
            match self.tables.match_provider(&normalized) {
                Some(provider) => {
                    if found.is_none() {
                        found = Some(provider.to_string());
                    }
                }
                None if !unmatched.iter().any(|u| u.normalized == normalized) => {
                    unmatched.push(UnmatchedNs { raw, normalized })
                }
                None => {}
            }
        }

        match found {
            Some(provider) => Resolution::Found(provider).into(),
            None => HostingAttempt {
                resolution: Resolution::NotFound,
                unmatched,
            },
        }
    }
}

/// 阶段三：扫描 WHOIS 文本中的托管商关键字
pub struct WhoisStage {
    whois: Arc<dyn WhoisLookup>,
}

impl WhoisStage {
    pub const NAME: &'static str = "whois";

    pub fn new(whois: Arc<dyn WhoisLookup>) -> Self {
        Self { whois }
    }
}

/// 在 WHOIS 文本中查找第一个出现的托管商关键字
pub fn scan_whois(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    WHOIS_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, provider)| *provider)
}

#[async_trait]
impl HostingStage for WhoisStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn attempt(&self, domain: &ResolvedDomain) -> HostingAttempt {
        match self.whois.query(domain.as_str()).await {
            Ok(text) => match scan_whois(&text) {
                Some(provider) => Resolution::Found(provider.to_string()),
                None => Resolution::NotFound,
            },
            Err(e @ WhoisError::NoServer(_)) => Resolution::Fatal(e.to_string()),
            Err(e) => Resolution::Transient(e.to_string()),
        }
        .into()
    }
}

/// 阶段四：按 IP 查询主机情报服务，返回第一个关联主机名并标注来源
pub struct PassiveIntelStage {
    dns: Arc<dyn DnsLookup>,
    client: Option<Arc<HostIntelClient>>,
}

impl PassiveIntelStage {
    pub fn new(dns: Arc<dyn DnsLookup>, client: Option<Arc<HostIntelClient>>) -> Self {
        Self { dns, client }
    }
}

#[async_trait]
impl HostingStage for PassiveIntelStage {
    fn name(&self) -> &'static str {
        "host_intel"
    }

    async fn attempt(&self, domain: &ResolvedDomain) -> HostingAttempt {
        let Some(client) = &self.client else {
            return Resolution::Fatal("host intel api key not configured".into()).into();
        };
        let ip = match first_ip(self.dns.as_ref(), domain).await {
            Ok(ip) => ip,
            Err(resolution) => return resolution.into(),
        };
        match client.host(&ip).await {
            Ok(Some(intel)) => match intel.hostnames.first() {
                Some(hostname) => Resolution::Found(format!("{} (via host-intel)", hostname)),
                None => Resolution::NotFound,
            },
            Ok(None) => Resolution::NotFound,
            Err(e) => lookup_failure(e),
        }
        .into()
    }
}
