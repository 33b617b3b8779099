// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

/// 邮箱最大长度
const MAX_EMAIL_LEN: usize = 100;

/// 出现在地址中即视为误报（图片文件名、logo）
const REJECTED_SUBSTRINGS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".bmp", "logo"];

static EMAIL_SCAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
        .expect("Failed to compile email scan regex")
});

static EMAIL_VALID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Failed to compile email validation regex")
});

static MAILTO_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href^='mailto:']").expect("Failed to parse mailto selector"));

/// 提取候选邮箱
///
/// 优先取 `mailto:` 链接；页面没有这类链接时才扫描全文。结果按出现顺序去重。
pub fn extract_candidates(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut candidates: Vec<String> = document
        .select(&MAILTO_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| {
            let address = href.get("mailto:".len()..)?;
            let address = address.split('?').next().unwrap_or_default();
            let decoded = urlencoding::decode(address)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| address.to_string());
            let decoded = decoded.trim().to_string();
            (!decoded.is_empty()).then_some(decoded)
        })
        .collect();

    if candidates.is_empty() {
        candidates = EMAIL_SCAN
            .find_iter(html)
            .map(|m| m.as_str().to_string())
            .collect();
    }

    let mut seen = std::collections::HashSet::new();
    candidates.retain(|c| seen.insert(c.to_ascii_lowercase()));
    candidates
}

/// 清理邮箱：去掉编码空格与换行，首尾空白，转小写
pub fn sanitize_email(raw: &str) -> String {
    raw.replace("%20", "")
        .replace(['\n', '\r'], "")
        .trim()
        .to_lowercase()
}

/// 校验邮箱：长度、结构，以及图片后缀与 logo 误报
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_EMAIL_LEN || !EMAIL_VALID.is_match(email) {
        return false;
    }
    let lower = email.to_ascii_lowercase();
    !REJECTED_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

/// 返回第一个清理后通过校验的邮箱，没有则为空字符串
pub fn first_valid_email(html: &str) -> String {
    extract_candidates(html)
        .iter()
        .map(|c| sanitize_email(c))
        .find(|c| is_valid_email(c))
        .unwrap_or_default()
}
