// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 集成测试共用的假实现与构造函数

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use sitescout::config::settings::TableSettings;
use sitescout::config::tables::LookupTables;
use sitescout::domain::models::entry::ResolvedDomain;
use sitescout::domain::services::availability_checker::{AvailabilityChecker, AvailabilityOptions};
use sitescout::domain::services::enrichment_service::EnrichmentService;
use sitescout::domain::services::exclusion_filter::ExclusionFilter;
use sitescout::domain::services::hosting_resolver::{HostingAttempt, HostingResolver, HostingStage};
use sitescout::domain::services::protocol_resolver::ProtocolResolver;
use sitescout::domain::services::resolution::Resolution;
use sitescout::domain::services::technology_resolver::{TechnologyOptions, TechnologyResolver};
use sitescout::engines::traits::{BrowserEngine, EngineError, Fetcher, RenderRequest, RenderedPage};
use sitescout::utils::retry_policy::RetryPolicy;
use sitescout::workers::{Mailer, MailerError, OutgoingMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// 仓库自带的配置目录
pub fn config_path(file: &str) -> String {
    format!("{}/config/{}", env!("CARGO_MANIFEST_DIR"), file)
}

/// 加载仓库自带的查找表
pub fn bundled_tables() -> Arc<LookupTables> {
    let settings = TableSettings {
        platform_signatures: config_path("platform_signatures.json"),
        excluded_domains: config_path("excluded_domains.txt"),
        hosting_providers: config_path("hosting_providers.json"),
        message_templates: config_path("message_templates.json"),
    };
    Arc::new(LookupTables::load(&settings).unwrap())
}

/// 按 URL 返回渲染结果；未登记的地址视为超时
#[derive(Default)]
pub struct RoutedBrowser {
    pages: Mutex<HashMap<String, RenderedPage>>,
    calls: Mutex<Vec<String>>,
}

impl RoutedBrowser {
    pub fn route(&self, url: &str, page: RenderedPage) -> &Self {
        self.pages.lock().insert(url.to_string(), page);
        self
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl BrowserEngine for RoutedBrowser {
    async fn render(&self, request: &RenderRequest) -> Result<RenderedPage, EngineError> {
        self.calls.lock().push(request.url.clone());
        self.pages
            .lock()
            .get(&request.url)
            .cloned()
            .ok_or(EngineError::Timeout)
    }
}

/// 结果列表页，每个链接放在 feed 下的一张卡片里
pub fn results_page(url: &str, links: &[&str]) -> RenderedPage {
    let cards: String = links
        .iter()
        .map(|href| format!(r#"<div jsaction="pane.card"><a href="{}">card</a></div>"#, href))
        .collect();
    RenderedPage {
        final_url: url.to_string(),
        html: format!(r#"<html><body><div role="feed">{}</div></body></html>"#, cards),
        ..Default::default()
    }
}

/// 商户详情页，求值结果是嵌套数组载荷
pub fn listing_page(url: &str, title: &str, website: &str, phone: &str) -> RenderedPage {
    let mut node = vec![Value::Null; 184];
    node[7] = json!([website]);
    node[11] = json!(title);
    node[13] = json!(["Pizzeria"]);
    node[178] = json!([[phone]]);
    node[183] = json!([null, [null, "Via Roma 1", null, "Lecce", null, "Province of Lecce"]]);
    RenderedPage {
        final_url: url.to_string(),
        evaluated: Some(json!([null, null, null, null, null, null, node])),
        ..Default::default()
    }
}

/// 固定返回托管商的阶段，避免访问真实 DNS
pub struct FixedHosting(pub &'static str);

#[async_trait]
impl HostingStage for FixedHosting {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn attempt(&self, _domain: &ResolvedDomain) -> HostingAttempt {
        Resolution::Found(self.0.to_string()).into()
    }
}

/// 使用仓库查找表与给定抓取器组装富化流水线
pub fn enrichment_service(fetcher: Arc<dyn Fetcher>) -> EnrichmentService {
    let tables = bundled_tables();
    let retry = RetryPolicy::fixed(2, Duration::from_millis(10));
    EnrichmentService::new(
        ExclusionFilter::new(tables.clone()),
        ProtocolResolver::new(fetcher.clone(), Duration::from_secs(2)),
        TechnologyResolver::new(fetcher.clone(), None, tables, TechnologyOptions::default()),
        HostingResolver::new(vec![Arc::new(FixedHosting("Aruba S.p.A."))], retry.clone()),
        AvailabilityChecker::new(
            fetcher,
            AvailabilityOptions {
                max_attempts: 2,
                max_redirects: 3,
                timeout: Duration::from_secs(2),
                confirm_timeout: Duration::from_secs(2),
                retry,
                max_retry_after: Duration::from_secs(60),
            },
        ),
        None,
    )
}

/// 记录每封消息的发送器，可指定某个地址总是被拒收
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingMessage>>,
    pub reject: Option<String>,
}

impl RecordingMailer {
    pub fn recipients(&self) -> Vec<String> {
        let mut to: Vec<String> = self.sent.lock().iter().map(|m| m.to.clone()).collect();
        to.sort();
        to
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), MailerError> {
        self.sent.lock().push(message.clone());
        if self.reject.as_deref() == Some(message.to.as_str()) {
            return Err(MailerError::Rejected("mailbox unavailable".into()));
        }
        Ok(())
    }
}
