// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &str, path: &str) -> Result<Url, ParseError> {
    Url::parse(base_url)?.join(path)
}

/// 返回输入携带的显式协议（仅识别 http / https）
pub fn explicit_scheme(raw: &str) -> Option<&'static str> {
    let lower = raw.trim().to_ascii_lowercase();
    if lower.starts_with("https://") {
        Some("https")
    } else if lower.starts_with("http://") {
        Some("http")
    } else {
        None
    }
}

/// 将原始网址归一化为裸域名
///
/// 去掉协议、用户信息、路径、查询、片段、端口、开头的 `www.` 以及末尾的点，并转为小写。
/// 无法得到主机名时返回空字符串。
pub fn normalize_domain(raw: &str) -> String {
    let mut rest = raw.trim();

    // Google 的跳转链接形如 /url?q=https://example.com&...
    if let Some(target) = rest.strip_prefix("/url?q=") {
        rest = target.split('&').next().unwrap_or_default();
    }

    if let Some(idx) = rest.find("://") {
        rest = &rest[idx + 3..];
    } else if let Some(stripped) = rest.strip_prefix("//") {
        rest = stripped;
    }

    let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let mut host = &rest[..host_end];

    if let Some(at) = host.rfind('@') {
        host = &host[at + 1..];
    }
    if let Some(colon) = host.find(':') {
        host = &host[..colon];
    }

    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}
