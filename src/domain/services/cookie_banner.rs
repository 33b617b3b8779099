// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 页面文本中的 Cookie 告知短语（小写）
const CONSENT_PHRASES: &[&str] = &[
    "cookie policy",
    "informativa cookie",
    "informativa sui cookie",
    "utilizziamo i cookie",
    "questo sito utilizza cookie",
    "questo sito usa cookie",
    "we use cookies",
    "this website uses cookies",
    "accept all cookies",
    "accetta tutti i cookie",
];

/// 常见同意管理平台的脚本或标记（小写）
const CMP_MARKERS: &[&str] = &[
    "iubenda",
    "cookiebot",
    "onetrust",
    "cookieyes",
    "complianz",
    "cookie-law-info",
    "cookie-notice",
    "didomi",
    "quantcast choice",
];

/// 判断页面是否包含 Cookie 横幅或同意管理脚本
pub fn detect_cookie_banner(html: &str) -> bool {
    let lower = html.to_lowercase();
    CONSENT_PHRASES.iter().any(|p| lower.contains(p)) || CMP_MARKERS.iter().any(|m| lower.contains(m))
}
