// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::url_utils::normalize_domain;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 归一化后的域名
///
/// 去掉协议、`www.`、端口与路径后的主机名，是各解析器的工作单元
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedDomain(String);

impl ResolvedDomain {
    /// 从原始网址解析，得不到主机名时返回 `None`
    pub fn parse(raw: &str) -> Option<Self> {
        let domain = normalize_domain(raw);
        if domain.is_empty() || !domain.contains('.') {
            None
        } else {
            Some(Self(domain))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 顶级域名（最后一个标签）
    pub fn tld(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or_default()
    }
}

impl fmt::Display for ResolvedDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 网站相关的派生字段
///
/// 零值（`Default`）表示未做任何富化
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    /// 传输协议 (https / http / undetermined)
    pub protocol: String,
    /// 网站平台
    pub technology: String,
    /// 托管商
    pub hosting_provider: String,
    /// 是否存在 Cookie 横幅
    pub cookie_banner: Option<bool>,
    /// 移动端性能分
    pub mobile_performance: Option<u8>,
    /// 桌面端性能分
    pub desktop_performance: Option<u8>,
    /// SEO 分
    pub seo_score: Option<u8>,
    /// 可用性标签
    pub availability: String,
    /// 是否处于维护/建设中
    pub maintenance: Option<bool>,
}

impl Enrichment {
    /// 所有字段均为零值
    pub fn is_empty(&self) -> bool {
        self == &Enrichment::default()
    }
}

/// 聚合后的单条商户记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub link: String,
    pub title: String,
    pub category: String,
    pub website: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub province: String,
    pub email: String,
    pub enrichment: Enrichment,
}

impl Entry {
    /// 网站对应的归一化域名
    pub fn domain(&self) -> Option<ResolvedDomain> {
        ResolvedDomain::parse(&self.website)
    }
}

/// 输出的扁平记录，字段顺序即列顺序
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub title: String,
    pub category: String,
    pub domain: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub province: String,
    pub email: String,
    pub protocol: String,
    pub technology: String,
    pub cookie_banner: String,
    pub hosting_provider: String,
    pub mobile_performance: String,
    pub desktop_performance: String,
    pub seo_score: String,
    pub availability: String,
    pub maintenance: String,
}

fn flag(value: Option<bool>) -> String {
    match value {
        Some(true) => "yes".to_string(),
        Some(false) => "no".to_string(),
        None => String::new(),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "sì" | "si" => Some(true),
        "no" | "false" => Some(false),
        _ => None,
    }
}

fn score(value: Option<u8>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl From<&Entry> for EntryRecord {
    fn from(entry: &Entry) -> Self {
        let e = &entry.enrichment;
        Self {
            title: entry.title.clone(),
            category: entry.category.clone(),
            domain: entry.domain().map(|d| d.to_string()).unwrap_or_default(),
            phone: entry.phone.clone(),
            street: entry.street.clone(),
            city: entry.city.clone(),
            province: entry.province.clone(),
            email: entry.email.clone(),
            protocol: e.protocol.clone(),
            technology: e.technology.clone(),
            cookie_banner: flag(e.cookie_banner),
            hosting_provider: e.hosting_provider.clone(),
            mobile_performance: score(e.mobile_performance),
            desktop_performance: score(e.desktop_performance),
            seo_score: score(e.seo_score),
            availability: e.availability.clone(),
            maintenance: flag(e.maintenance),
        }
    }
}

impl From<EntryRecord> for Entry {
    fn from(record: EntryRecord) -> Self {
        Self {
            id: String::new(),
            link: String::new(),
            title: record.title,
            category: record.category,
            website: record.domain,
            phone: record.phone,
            street: record.street,
            city: record.city,
            province: record.province,
            email: record.email,
            enrichment: Enrichment {
                protocol: record.protocol,
                technology: record.technology,
                hosting_provider: record.hosting_provider,
                cookie_banner: parse_flag(&record.cookie_banner),
                mobile_performance: record.mobile_performance.trim().parse().ok(),
                desktop_performance: record.desktop_performance.trim().parse().ok(),
                seo_score: record.seo_score.trim().parse().ok(),
                availability: record.availability,
                maintenance: parse_flag(&record.maintenance),
            },
        }
    }
}
