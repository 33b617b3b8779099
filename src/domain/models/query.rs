// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 一次地点搜索（关键词 × 地区）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingQuery {
    pub keyword: String,
    pub locality: String,
    pub language_code: String,
    pub max_scroll_depth: u32,
    pub extract_email: bool,
}

impl ListingQuery {
    /// 提交给搜索服务的查询文本
    pub fn search_text(&self) -> String {
        format!("{} {}", self.keyword.trim(), self.locality.trim())
            .trim()
            .to_string()
    }

    /// 关键词与地区的笛卡尔积
    pub fn combinations(
        keywords: &[String],
        localities: &[String],
        language_code: &str,
        max_scroll_depth: u32,
        extract_email: bool,
    ) -> Vec<ListingQuery> {
        keywords
            .iter()
            .flat_map(|keyword| {
                localities.iter().map(move |locality| ListingQuery {
                    keyword: keyword.clone(),
                    locality: locality.clone(),
                    language_code: language_code.to_string(),
                    max_scroll_depth,
                    extract_email,
                })
            })
            .collect()
    }
}
