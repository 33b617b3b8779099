// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::{anyhow, Context, Result};
use std::path::Path;

/// 读取 `;` 分隔的种子文件中的一列
///
/// # 参数
///
/// * `path` - 文件路径
/// * `columns` - 可接受的列名（不区分大小写），取第一个存在的
///
/// # 返回值
///
/// 去掉首尾空白后的非空值，保持文件顺序
pub fn read_column(path: impl AsRef<Path>, columns: &[&str]) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("cannot open seed file {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let index = headers
        .iter()
        .position(|h| {
            let h = h.trim().trim_start_matches('\u{feff}');
            columns.iter().any(|c| h.eq_ignore_ascii_case(c))
        })
        .ok_or_else(|| anyhow!("{} has no column named {}", path.display(), columns.join(" or ")))?;

    let mut values = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("malformed row in {}", path.display()))?;
        if let Some(value) = row.get(index).map(str::trim).filter(|v| !v.is_empty()) {
            values.push(value.to_string());
        }
    }
    Ok(values)
}

/// 读取关键词列表
pub fn read_keywords(path: impl AsRef<Path>) -> Result<Vec<String>> {
    read_column(path, &["keyword"])
}

/// 读取地区列表（兼容 `comuni` 列名）
pub fn read_localities(path: impl AsRef<Path>) -> Result<Vec<String>> {
    read_column(path, &["locality", "comuni"])
}
