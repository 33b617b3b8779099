// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// 表示维护或建设中的短语
const MAINTENANCE_PHRASES: &[&str] = &[
    "in costruzione",
    "sito in costruzione",
    "manutenzione",
    "in manutenzione",
    "lavori in corso",
    "torniamo presto",
    "sito in allestimento",
    "prossimamente online",
    "under construction",
    "maintenance mode",
    "under maintenance",
    "site under maintenance",
    "down for maintenance",
    "scheduled maintenance",
    "work in progress",
    "coming soon",
    "temporarily unavailable",
    "we'll be back soon",
];

/// 逐个提取文本的标签类型
const SCANNED_TAGS: &[&str] = &[
    "title", "h1", "h2", "h3", "h4", "h5", "h6", "p", "em", "strong", "b", "i", "a", "footer",
    "header", "div", "section", "article", "main", "aside", "span", "blockquote", "q", "cite",
    "ins", "del", "li", "label",
];

/// 其中的文本不参与匹配
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];

static MAINTENANCE_RE: Lazy<Regex> = Lazy::new(|| {
    let alternatives = MAINTENANCE_PHRASES
        .iter()
        .map(|phrase| {
            phrase
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives))
        .expect("Failed to compile maintenance phrase regex")
});

static TAG_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    SCANNED_TAGS
        .iter()
        .map(|tag| Selector::parse(tag).expect("Failed to parse tag selector"))
        .collect()
});

static META_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[name][content]").expect("Failed to parse meta selector"));

/// 判断渲染后的页面是否处于维护或建设中
///
/// 按标签类型分别提取可见文本再匹配短语，脚本与样式中的文本不参与匹配；
/// 另外识别 `maintenance=true` 与 `status=maintenance` 两种 meta 标记。
pub fn detect_maintenance(html: &str) -> bool {
    let document = Html::parse_document(html);

    if has_maintenance_meta(&document) {
        return true;
    }

    TAG_SELECTORS.iter().any(|selector| {
        document
            .select(selector)
            .any(|element| MAINTENANCE_RE.is_match(&visible_text(element)))
    })
}

fn has_maintenance_meta(document: &Html) -> bool {
    document.select(&META_SELECTOR).any(|meta| {
        let name = meta.value().attr("name").unwrap_or_default().trim();
        let content = meta.value().attr("content").unwrap_or_default().trim();
        (name.eq_ignore_ascii_case("maintenance") && content.eq_ignore_ascii_case("true"))
            || (name.eq_ignore_ascii_case("status") && content.eq_ignore_ascii_case("maintenance"))
    })
}

/// 元素内不在脚本、样式等标签中的文本
pub fn visible_text(element: ElementRef) -> String {
    let mut text = String::new();
    for node in element.descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .filter_map(|a| a.value().as_element())
            .any(|e| HIDDEN_TAGS.contains(&e.name()));
        if !hidden {
            text.push_str(fragment);
            text.push(' ');
        }
    }
    text
}
