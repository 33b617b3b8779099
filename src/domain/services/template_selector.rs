// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::tables::TableError;
use crate::domain::models::entry::Entry;
use crate::domain::services::availability_checker::AVAILABLE;
use crate::domain::services::resolution::OTHER_PLATFORM;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// 模板类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    NoWebsite,
    Unavailable,
    Maintenance,
    Review,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TemplateKind::NoWebsite => write!(f, "no_website"),
            TemplateKind::Unavailable => write!(f, "unavailable"),
            TemplateKind::Maintenance => write!(f, "maintenance"),
            TemplateKind::Review => write!(f, "review"),
        }
    }
}

/// 单个消息模板
#[derive(Debug, Clone, Deserialize)]
pub struct MessageTemplate {
    pub subject: String,
    pub body: Vec<String>,
}

/// 评估模板中的一条结论
#[derive(Debug, Clone, Deserialize)]
pub struct Clause {
    pub ok: String,
    pub issue: String,
    /// 没有数据时使用，缺省时回退到 `issue`
    #[serde(default)]
    pub unknown: Option<String>,
}

impl Clause {
    fn pick(&self, verdict: Option<bool>) -> &str {
        match verdict {
            Some(true) => &self.ok,
            Some(false) => &self.issue,
            None => self.unknown.as_deref().unwrap_or(&self.issue),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Clauses {
    pub protocol: Clause,
    pub technology: Clause,
    pub cookie_banner: Clause,
    pub performance: Clause,
}

/// 外发消息模板集
#[derive(Debug, Clone, Deserialize)]
pub struct MessageTemplates {
    pub no_website: MessageTemplate,
    pub unavailable: MessageTemplate,
    pub maintenance: MessageTemplate,
    pub review: MessageTemplate,
    pub clauses: Clauses,
}

/// 渲染完成的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub kind: TemplateKind,
    pub subject: String,
    pub body: String,
}

/// 按优先级选择模板：无网站 → 不可访问 → 维护中 → 评估
pub fn select_template(entry: &Entry) -> TemplateKind {
    let enrichment = &entry.enrichment;
    if entry.website.trim().is_empty() {
        TemplateKind::NoWebsite
    } else if !enrichment.availability.is_empty() && enrichment.availability != AVAILABLE {
        TemplateKind::Unavailable
    } else if enrichment.maintenance == Some(true) {
        TemplateKind::Maintenance
    } else {
        TemplateKind::Review
    }
}

impl MessageTemplates {
    /// 从 JSON 文件加载模板，文件缺失或格式错误属于配置故障
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| TableError::Malformed {
            path: PathBuf::from(path),
            source,
        })
    }

    pub fn template(&self, kind: TemplateKind) -> &MessageTemplate {
        match kind {
            TemplateKind::NoWebsite => &self.no_website,
            TemplateKind::Unavailable => &self.unavailable,
            TemplateKind::Maintenance => &self.maintenance,
            TemplateKind::Review => &self.review,
        }
    }

    /// 为记录选择并渲染模板
    ///
    /// # 参数
    ///
    /// * `entry` - 富化后的记录
    /// * `performance_threshold` - 移动端性能分不低于该值视为良好
    pub fn render(&self, entry: &Entry, performance_threshold: u8) -> RenderedMessage {
        let kind = select_template(entry);
        let enrichment = &entry.enrichment;
        let template = self.template(kind);

        let technology = enrichment.technology.trim();
        let technology_known = !technology.is_empty() && technology != OTHER_PLATFORM;
        let clauses = &self.clauses;
        let values: Vec<(&str, String)> = vec![
            (
                "{protocol_clause}",
                clauses
                    .protocol
                    .pick(Some(enrichment.protocol.eq_ignore_ascii_case("https")))
                    .to_string(),
            ),
            (
                "{technology_clause}",
                clauses.technology.pick(Some(technology_known)).to_string(),
            ),
            (
                "{cookie_clause}",
                clauses.cookie_banner.pick(enrichment.cookie_banner).to_string(),
            ),
            (
                "{performance_clause}",
                clauses
                    .performance
                    .pick(enrichment.mobile_performance.map(|s| s >= performance_threshold))
                    .to_string(),
            ),
            ("{name}", entry.title.clone()),
            (
                "{domain}",
                entry
                    .domain()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| entry.website.clone()),
            ),
            ("{availability}", enrichment.availability.clone()),
            ("{technology}", technology.to_string()),
            (
                "{score}",
                enrichment
                    .mobile_performance
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
            ),
        ];

        RenderedMessage {
            kind,
            subject: substitute(&template.subject, &values),
            body: substitute(&template.body.join("\n"), &values),
        }
    }
}

/// 依次替换占位符；结论先于字段替换，结论中的字段占位符也会被填充
fn substitute(text: &str, values: &[(&str, String)]) -> String {
    values
        .iter()
        .fold(text.to_string(), |acc, (key, value)| acc.replace(key, value))
}
