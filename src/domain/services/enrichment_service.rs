// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::Settings;
use crate::config::tables::LookupTables;
use crate::domain::models::entry::{Enrichment, ResolvedDomain};
use crate::domain::services::availability_checker::{AvailabilityChecker, AvailabilityOptions};
use crate::domain::services::cookie_banner::detect_cookie_banner;
use crate::domain::services::exclusion_filter::ExclusionFilter;
use crate::domain::services::hosting_resolver::HostingResolver;
use crate::domain::services::maintenance_detector::detect_maintenance;
use crate::domain::services::pagespeed_service::PageSpeedService;
use crate::domain::services::protocol_resolver::ProtocolResolver;
use crate::domain::services::resolution::{ResolveError, UNDETERMINED_PROTOCOL};
use crate::domain::services::technology_resolver::{TechnologyOptions, TechnologyResolver};
use crate::engines::traits::{BrowserEngine, Fetcher};
use crate::infrastructure::curation_log::{CsvLogError, UnmatchedNameserverLog};
use crate::infrastructure::dns::DnsLookup;
use crate::utils::url_utils::explicit_scheme;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 记录富化能力
///
/// 任务层只依赖这个接口，测试中可以替换为假实现
#[async_trait]
pub trait Enricher: Send + Sync {
    /// 网站是否应在富化前被排除
    fn is_excluded(&self, website: &str) -> bool;

    /// 依次运行各解析器；单个解析器失败不会中断后续解析器
    async fn enrich(&self, website: &str, cancel: &CancellationToken) -> Enrichment;
}

/// 富化流水线
///
/// 顺序固定为 协议 → 技术 → 托管商 → (PageSpeed) → 可用性，
/// 维护状态与 Cookie 横幅从可用性检测拿到的正文中计算。
pub struct EnrichmentService {
    exclusion: ExclusionFilter,
    protocol: ProtocolResolver,
    technology: TechnologyResolver,
    hosting: HostingResolver,
    availability: AvailabilityChecker,
    pagespeed: Option<PageSpeedService>,
}

impl EnrichmentService {
    pub fn new(
        exclusion: ExclusionFilter,
        protocol: ProtocolResolver,
        technology: TechnologyResolver,
        hosting: HostingResolver,
        availability: AvailabilityChecker,
        pagespeed: Option<PageSpeedService>,
    ) -> Self {
        Self {
            exclusion,
            protocol,
            technology,
            hosting,
            availability,
            pagespeed,
        }
    }

    /// 按配置组装完整流水线
    ///
    /// # 参数
    ///
    /// * `settings` - 应用配置
    /// * `tables` - 已加载的查找表
    /// * `fetcher` - HTTP 抓取器
    /// * `browser` - 无头浏览器（可选，缺省时跳过动态分析）
    /// * `dns` - DNS 解析器
    ///
    /// # 返回值
    ///
    /// * `Ok(EnrichmentService)` - 组装完成的流水线
    /// * `Err(CsvLogError)` - 无法打开未匹配名称服务器日志
    pub fn from_settings(
        settings: &Settings,
        tables: Arc<LookupTables>,
        fetcher: Arc<dyn Fetcher>,
        browser: Option<Arc<dyn BrowserEngine>>,
        dns: Arc<dyn DnsLookup>,
    ) -> Result<Self, CsvLogError> {
        let curation = Arc::new(UnmatchedNameserverLog::open(&settings.hosting.unmatched_log_path)?);
        let technology_options = TechnologyOptions {
            page_timeout: settings.http.request_timeout(),
            script_timeout: settings.http.script_timeout(),
            script_limit: settings.http.script_fetch_limit,
            browser_timeout: settings.http.browser_timeout(),
        };

        Ok(Self::new(
            ExclusionFilter::new(tables.clone()),
            ProtocolResolver::new(fetcher.clone(), settings.http.request_timeout()),
            TechnologyResolver::new(fetcher.clone(), browser, tables.clone(), technology_options),
            HostingResolver::from_settings(&settings.hosting, tables, dns).with_curation_log(curation),
            AvailabilityChecker::new(fetcher, AvailabilityOptions::from(&settings.availability)),
            settings
                .pagespeed
                .enabled
                .then(|| PageSpeedService::new(&settings.pagespeed)),
        ))
    }

    async fn run(
        &self,
        website: &str,
        domain: &ResolvedDomain,
        enrichment: &mut Enrichment,
        cancel: &CancellationToken,
    ) -> Result<(), ResolveError> {
        let protocol = match self.protocol.resolve(website, cancel).await {
            Ok(scheme) => {
                record_stage("protocol", "found");
                scheme
            }
            Err(ResolveError::Cancelled) => return Err(ResolveError::Cancelled),
            Err(e) => {
                record_stage("protocol", "failed");
                warn!("Protocol resolution for {} failed: {}", domain, e);
                UNDETERMINED_PROTOCOL
            }
        };
        enrichment.protocol = protocol.to_string();

        let url = site_url(website, domain, protocol);

        enrichment.technology = self.technology.resolve(&url, cancel).await;
        record_stage("technology", "found");
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        enrichment.hosting_provider = self.hosting.resolve(domain, cancel).await?;
        record_stage("hosting", "found");

        if let Some(pagespeed) = &self.pagespeed {
            let scores = pagespeed.scores(&url, cancel).await?;
            enrichment.mobile_performance = scores.mobile;
            enrichment.desktop_performance = scores.desktop;
            enrichment.seo_score = scores.seo;
            record_stage("pagespeed", "found");
        }

        let outcome = self.availability.check(&url, cancel).await?;
        record_stage("availability", if outcome.is_available() { "available" } else { "unavailable" });
        enrichment.availability = outcome.status;
        if let Some(body) = outcome.body {
            enrichment.maintenance = Some(detect_maintenance(&body));
            enrichment.cookie_banner = Some(detect_cookie_banner(&body));
        }
        Ok(())
    }
}

/// 显式协议的网址原样使用，否则用解析出的协议拼接域名
fn site_url(website: &str, domain: &ResolvedDomain, protocol: &str) -> String {
    if explicit_scheme(website).is_some() {
        website.trim().to_string()
    } else if protocol == "http" {
        format!("http://{}", domain)
    } else {
        format!("https://{}", domain)
    }
}

fn record_stage(stage: &'static str, outcome: &'static str) {
    metrics::counter!("enrichment_stage_total", "stage" => stage, "outcome" => outcome).increment(1);
}

#[async_trait]
impl Enricher for EnrichmentService {
    fn is_excluded(&self, website: &str) -> bool {
        self.exclusion.should_exclude(website)
    }

    async fn enrich(&self, website: &str, cancel: &CancellationToken) -> Enrichment {
        let mut enrichment = Enrichment::default();
        let Some(domain) = ResolvedDomain::parse(website) else {
            debug!("No domain in {:?}, skipping enrichment", website);
            return enrichment;
        };

        let started = Instant::now();
        if let Err(e) = self.run(website, &domain, &mut enrichment, cancel).await {
            info!("Enrichment of {} stopped early: {}", domain, e);
        }
        metrics::histogram!("enrichment_duration_seconds").record(started.elapsed().as_secs_f64());
        enrichment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tables::{case_insensitive, PlatformSignature};
    use crate::domain::services::hosting_resolver::{HostingAttempt, HostingStage};
    use crate::domain::services::resolution::Resolution;
    use crate::test_support::ScriptedFetcher;
    use crate::utils::retry_policy::RetryPolicy;
    use std::collections::HashSet;
    use std::time::Duration;

    struct FixedStage(&'static str);

    #[async_trait]
    impl HostingStage for FixedStage {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn attempt(&self, _domain: &ResolvedDomain) -> HostingAttempt {
            Resolution::Found(self.0.to_string()).into()
        }
    }

    fn service(fetcher: Arc<ScriptedFetcher>) -> EnrichmentService {
        let tables = Arc::new(LookupTables {
            platforms: vec![PlatformSignature {
                name: "WordPress".into(),
                patterns: vec![case_insensitive("test", "wp-content").unwrap()],
            }],
            excluded_domains: HashSet::from(["facebook.com".to_string()]),
            ..Default::default()
        });
        let retry = RetryPolicy::fixed(2, Duration::from_millis(1));
        EnrichmentService::new(
            ExclusionFilter::new(tables.clone()),
            ProtocolResolver::new(fetcher.clone(), Duration::from_secs(1)),
            TechnologyResolver::new(fetcher.clone(), None, tables, TechnologyOptions::default()),
            HostingResolver::new(vec![Arc::new(FixedStage("Aruba S.p.A."))], retry.clone()),
            AvailabilityChecker::new(
                fetcher,
                AvailabilityOptions {
                    max_attempts: 2,
                    max_redirects: 3,
                    timeout: Duration::from_secs(1),
                    confirm_timeout: Duration::from_secs(1),
                    retry,
                    max_retry_after: Duration::from_secs(60),
                },
            ),
            None,
        )
    }

    #[tokio::test]
    async fn test_full_chain() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.respond(
            "https://pizzeria-roma.it",
            200,
            r#"<html><head><title>Sito in costruzione</title>
               <link rel="stylesheet" href="/wp-content/themes/x.css"></head>
               <body><a href="/privacy">Cookie Policy</a></body></html>"#,
        );
        let service = service(fetcher);

        let enrichment = service
            .enrich("www.pizzeria-roma.it", &CancellationToken::new())
            .await;

        assert_eq!(enrichment.protocol, "https");
        assert_eq!(enrichment.technology, "WordPress");
        assert_eq!(enrichment.hosting_provider, "Aruba S.p.A.");
        assert_eq!(enrichment.availability, "available");
        assert_eq!(enrichment.maintenance, Some(true));
        assert_eq!(enrichment.cookie_banner, Some(true));
        assert_eq!(enrichment.mobile_performance, None);
    }

    #[tokio::test]
    async fn test_failures_are_absorbed() {
        // nothing scripted: every request is refused
        let fetcher = Arc::new(ScriptedFetcher::new());
        let service = service(fetcher);

        let enrichment = service.enrich("deadsite.it", &CancellationToken::new()).await;

        assert_eq!(enrichment.protocol, UNDETERMINED_PROTOCOL);
        assert_eq!(enrichment.technology, "Other");
        assert_eq!(enrichment.hosting_provider, "Aruba S.p.A.");
        assert_eq!(enrichment.availability, "exhausted retries (connection error)");
        assert_eq!(enrichment.maintenance, None);
        assert_eq!(enrichment.cookie_banner, None);
    }

    #[tokio::test]
    async fn test_empty_website_is_never_fetched() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let service = service(fetcher.clone());

        let enrichment = service.enrich("", &CancellationToken::new()).await;

        assert!(enrichment.is_empty());
        assert_eq!(fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_returns_partial() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let service = service(fetcher.clone());
        let token = CancellationToken::new();
        token.cancel();

        let enrichment = service.enrich("https://a.it", &token).await;

        // explicit scheme needs no network
        assert_eq!(enrichment.protocol, "https");
        assert!(enrichment.availability.is_empty());
        assert_eq!(fetcher.total_calls(), 0);
    }

    #[test]
    fn test_exclusion_delegates_to_filter() {
        let service = service(Arc::new(ScriptedFetcher::new()));
        assert!(service.is_excluded("https://www.facebook.com/pizzeria"));
        assert!(!service.is_excluded("https://pizzeria-roma.it"));
    }
}
