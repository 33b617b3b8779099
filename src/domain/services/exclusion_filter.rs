// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::tables::LookupTables;
use crate::utils::url_utils::normalize_domain;
use std::sync::Arc;

/// 第三方平台、品牌与机构域名片段，包含即排除
const PLATFORM_SUBSTRINGS: &[&str] = &[
    "facebook.com",
    "fb.me",
    "instagram.com",
    "linkedin.com",
    "twitter.com",
    "youtube.com",
    "pinterest.com",
    "tiktok.com",
    "tumblr.com",
    "wa.me",
    "linktr.ee",
    "calendar.app.google",
    "booking.com",
    "airbnb.com",
    "tripadvisor.",
    "trivago.com",
    "amazon.",
    "ebay.",
    "apple.com",
    "wix.com",
    "squarespace.com",
    "weebly.com",
    "godaddy.com",
    "dhl.com",
    "ups.com",
    "fedex.com",
    "gls-italy.com",
    "paginegialle.it",
    ".gov.it",
    "sanita.",
    "comune.",
    "e-coop.it",
];

/// 禁止的域名前缀
const FORBIDDEN_PREFIXES: &[&str] = &["lecce", "centrocommerciale"];

/// 禁止的域名后缀
const FORBIDDEN_SUFFIXES: &[&str] = &[".edu.it", ".edu", ".gov"];

/// 排除过滤器
///
/// 纯字符串判断，不访问网络；必须在任何解析阶段之前运行
#[derive(Clone)]
pub struct ExclusionFilter {
    tables: Arc<LookupTables>,
}

impl ExclusionFilter {
    pub fn new(tables: Arc<LookupTables>) -> Self {
        Self { tables }
    }

    /// 判断网址是否应被排除
    ///
    /// # 参数
    ///
    /// * `raw_url` - 商户记录中的原始网址
    ///
    /// # 返回值
    ///
    /// 归一化后的域名命中排除表（精确、前缀或后缀）、平台片段、禁止前缀或禁止后缀时返回 true。
    /// 空网址没有可富化的对象，同样返回 true。
    pub fn should_exclude(&self, raw_url: &str) -> bool {
        let domain = normalize_domain(raw_url);
        if domain.is_empty() {
            return true;
        }

        if self.tables.excluded_domains.contains(&domain) {
            return true;
        }
        if self
            .tables
            .excluded_domains
            .iter()
            .any(|entry| domain.starts_with(entry.as_str()) || domain.ends_with(entry.as_str()))
        {
            return true;
        }

        PLATFORM_SUBSTRINGS.iter().any(|s| domain.contains(s))
            || FORBIDDEN_PREFIXES.iter().any(|p| domain.starts_with(p))
            || FORBIDDEN_SUFFIXES.iter().any(|s| domain.ends_with(s))
    }
}
