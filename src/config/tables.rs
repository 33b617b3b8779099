// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::TableSettings;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 查找表加载错误
///
/// 属于配置故障，只在启动时出现，不做逐任务恢复
#[derive(Error, Debug)]
pub enum TableError {
    #[error("cannot read table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed table {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid pattern {pattern:?} in {table}: {source}")]
    InvalidPattern {
        table: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// 平台特征：平台名 → 大小写不敏感的模式列表
#[derive(Debug, Clone)]
pub struct PlatformSignature {
    pub name: String,
    pub patterns: Vec<Regex>,
}

impl PlatformSignature {
    pub fn is_match(&self, haystack: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(haystack))
    }
}

/// 细化规则：通用建站平台命中时，若正文同时出现次级模式则改判为具体平台
#[derive(Debug, Clone)]
pub struct Refinement {
    pub generic: String,
    pub specific: String,
    pub pattern: Regex,
}

/// 托管商模式：`*` 在加载时展开为 `.*`，整体锚定匹配
#[derive(Debug, Clone)]
pub struct ProviderPattern {
    pub raw: String,
    pub pattern: Regex,
    pub provider: String,
}

#[derive(Deserialize)]
struct PlatformFile {
    platforms: Vec<PlatformEntry>,
    #[serde(default)]
    refinements: Vec<RefinementEntry>,
}

#[derive(Deserialize)]
struct PlatformEntry {
    name: String,
    patterns: Vec<String>,
}

#[derive(Deserialize)]
struct RefinementEntry {
    generic: String,
    specific: String,
    pattern: String,
}

#[derive(Deserialize)]
struct ProviderEntry {
    pattern: String,
    provider: String,
}

/// 启动时加载一次的只读查找表
///
/// 通过 `Arc` 在各解析器之间共享，加载后不再修改
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub platforms: Vec<PlatformSignature>,
    pub refinements: Vec<Refinement>,
    pub excluded_domains: HashSet<String>,
    pub hosting_providers: Vec<ProviderPattern>,
}

impl LookupTables {
    /// 从配置的路径加载全部查找表
    ///
    /// # 参数
    ///
    /// * `settings` - 查找表路径配置
    ///
    /// # 返回值
    ///
    /// * `Ok(LookupTables)` - 加载完成的查找表
    /// * `Err(TableError)` - 文件缺失、格式错误或模式非法
    pub fn load(settings: &TableSettings) -> Result<Self, TableError> {
        let platform_json = read_file(Path::new(&settings.platform_signatures))?;
        let platform_file: PlatformFile =
            serde_json::from_str(&platform_json).map_err(|source| TableError::Malformed {
                path: PathBuf::from(&settings.platform_signatures),
                source,
            })?;

        let provider_json = read_file(Path::new(&settings.hosting_providers))?;
        let providers: Vec<ProviderEntry> =
            serde_json::from_str(&provider_json).map_err(|source| TableError::Malformed {
                path: PathBuf::from(&settings.hosting_providers),
                source,
            })?;

        let excluded = read_file(Path::new(&settings.excluded_domains))?;

        let platforms = platform_file
            .platforms
            .into_iter()
            .map(|p| {
                let patterns = p
                    .patterns
                    .iter()
                    .map(|s| case_insensitive("platform_signatures", s))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(PlatformSignature { name: p.name, patterns })
            })
            .collect::<Result<Vec<_>, TableError>>()?;

        let refinements = platform_file
            .refinements
            .into_iter()
            .map(|r| {
                Ok(Refinement {
                    pattern: case_insensitive("refinements", &r.pattern)?,
                    generic: r.generic,
                    specific: r.specific,
                })
            })
            .collect::<Result<Vec<_>, TableError>>()?;

        let hosting_providers = providers
            .into_iter()
            .map(|p| ProviderPattern::new(&p.pattern, &p.provider))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            platforms,
            refinements,
            excluded_domains: parse_domain_list(&excluded),
            hosting_providers,
        })
    }

    /// 按表顺序返回第一个命中的托管商
    pub fn match_provider(&self, normalized_nameserver: &str) -> Option<&str> {
        self.hosting_providers
            .iter()
            .find(|p| p.pattern.is_match(normalized_nameserver))
            .map(|p| p.provider.as_str())
    }
}

impl ProviderPattern {
    /// 编译一条托管商模式
    ///
    /// 其余字符按字面量处理，只有 `*` 被展开
    pub fn new(raw: &str, provider: &str) -> Result<Self, TableError> {
        let expanded = raw
            .trim()
            .to_ascii_lowercase()
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let pattern = case_insensitive("hosting_providers", &format!("^{expanded}$"))?;
        Ok(Self {
            raw: raw.to_string(),
            pattern,
            provider: provider.to_string(),
        })
    }
}

/// 构造大小写不敏感的正则
pub fn case_insensitive(table: &'static str, pattern: &str) -> Result<Regex, TableError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| TableError::InvalidPattern {
            table,
            pattern: pattern.to_string(),
            source,
        })
}

fn read_file(path: &Path) -> Result<String, TableError> {
    std::fs::read_to_string(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// 解析域名列表，忽略空行与 `#` 注释
pub fn parse_domain_list(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| l.to_ascii_lowercase())
        .collect()
}
