// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::entry::Entry;
use serde_json::Value;
use thiserror::Error;

/// 响应前缀，防 JSON 劫持用
const GUARD_PREFIX: &str = ")]}'";

const TITLE: &[usize] = &[11];
const CATEGORY: &[usize] = &[13, 0];
const WEBSITE: &[usize] = &[7, 0];
const PHONE: &[usize] = &[178, 0, 0];
const STREET: &[usize] = &[183, 1, 1];
const CITY: &[usize] = &[183, 1, 3];
const PROVINCE: &[usize] = &[183, 1, 5];

/// 载荷解析错误，只中止单个任务
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected payload shape: {0}")]
    Shape(String),
}

/// 商户详情的原始嵌套数组
///
/// 只被消费一次；`into_entry` 取得所有权，解析完成后即释放
#[derive(Debug)]
pub struct RawListingPayload(Value);

impl RawListingPayload {
    /// 解析原始字节，自动去掉防劫持前缀
    pub fn from_bytes(raw: &[u8]) -> Result<Self, PayloadError> {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_start();
        let text = text.strip_prefix(GUARD_PREFIX).unwrap_or(text);
        Ok(Self(serde_json::from_str(text)?))
    }

    /// 页面脚本求值的结果可能是字符串形式的 JSON，也可能已经是数组
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        match value {
            Value::String(s) => Self::from_bytes(s.as_bytes()),
            Value::Array(_) => Ok(Self(value)),
            other => Err(PayloadError::Shape(format!(
                "expected string or array, got {}",
                type_name(&other)
            ))),
        }
    }

    /// 解析为商户记录
    ///
    /// # 参数
    ///
    /// * `link` - 商户详情页地址
    ///
    /// # 返回值
    ///
    /// * `Ok(Entry)` - 只填充身份、地址与联系字段；富化字段保持零值
    /// * `Err(PayloadError)` - 外层数组长度不足或详情节点不是数组
    pub fn into_entry(self, link: &str) -> Result<Entry, PayloadError> {
        let outer = self
            .0
            .as_array()
            .ok_or_else(|| PayloadError::Shape("payload root is not an array".into()))?;
        if outer.len() < 7 {
            return Err(PayloadError::Shape(format!(
                "payload root has {} elements, expected at least 7",
                outer.len()
            )));
        }
        let listing = &outer[6];
        if !listing.is_array() {
            return Err(PayloadError::Shape("listing node is not an array".into()));
        }

        let province = text_at(listing, PROVINCE);
        let province = province
            .strip_prefix("Province of ")
            .or_else(|| province.strip_prefix("Provincia di "))
            .unwrap_or(&province)
            .to_string();

        Ok(Entry {
            link: link.to_string(),
            title: text_at(listing, TITLE),
            category: text_at(listing, CATEGORY),
            website: text_at(listing, WEBSITE),
            phone: text_at(listing, PHONE),
            street: text_at(listing, STREET),
            city: text_at(listing, CITY),
            province,
            ..Default::default()
        })
    }
}

/// 按索引路径取值，路径上任何一级缺失都返回 `None`
fn value_at<'a>(root: &'a Value, path: &[usize]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, &idx| node.as_array()?.get(idx))
}

fn text_at(root: &Value, path: &[usize]) -> String {
    match value_at(root, path) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// 构造一个在指定路径上放置值的稀疏数组
    fn place(root: &mut Value, path: &[usize], value: Value) {
        let mut node = root;
        for (i, &idx) in path.iter().enumerate() {
            let arr = node.as_array_mut().unwrap();
            while arr.len() <= idx {
                arr.push(Value::Null);
            }
            if i == path.len() - 1 {
                arr[idx] = value;
                return;
            }
            if !arr[idx].is_array() {
                arr[idx] = json!([]);
            }
            node = &mut arr[idx];
        }
    }

    fn sample_listing(website: &str) -> Value {
        let mut listing = json!([]);
        place(&mut listing, TITLE, json!("Pizzeria Da Mario"));
        place(&mut listing, CATEGORY, json!("Pizzeria"));
        place(&mut listing, WEBSITE, json!(website));
        place(&mut listing, PHONE, json!("+39 0832 123456"));
        place(&mut listing, STREET, json!("Via Roma 1"));
        place(&mut listing, CITY, json!("Lecce"));
        place(&mut listing, PROVINCE, json!("Province of Lecce"));
        json!([null, null, null, null, null, null, listing])
    }

    #[test]
    fn test_parse_listing_with_guard_prefix() {
        let raw = format!(")]}}'\n{}", sample_listing("https://www.damario.it"));
        let entry = RawListingPayload::from_bytes(raw.as_bytes())
            .unwrap()
            .into_entry("https://maps.example/place/1")
            .unwrap();

        assert_eq!(entry.title, "Pizzeria Da Mario");
        assert_eq!(entry.category, "Pizzeria");
        assert_eq!(entry.website, "https://www.damario.it");
        assert_eq!(entry.phone, "+39 0832 123456");
        assert_eq!(entry.street, "Via Roma 1");
        assert_eq!(entry.city, "Lecce");
        assert_eq!(entry.province, "Lecce");
        assert_eq!(entry.link, "https://maps.example/place/1");
        assert!(entry.enrichment.is_empty());
    }

    #[test]
    fn test_missing_fields_become_empty() {
        let payload = RawListingPayload::from_value(json!([0, 0, 0, 0, 0, 0, [null, null]])).unwrap();
        let entry = payload.into_entry("l").unwrap();
        assert_eq!(entry.title, "");
        assert_eq!(entry.website, "");
    }

    #[test]
    fn test_short_root_is_rejected() {
        let err = RawListingPayload::from_value(json!([1, 2, 3]))
            .unwrap()
            .into_entry("l")
            .unwrap_err();
        assert!(matches!(err, PayloadError::Shape(_)));
    }

    #[test]
    fn test_string_value_is_parsed() {
        let text = sample_listing("").to_string();
        let entry = RawListingPayload::from_value(Value::String(text))
            .unwrap()
            .into_entry("l")
            .unwrap();
        assert_eq!(entry.title, "Pizzeria Da Mario");
        assert!(entry.website.is_empty());
    }

    #[test]
    fn test_garbage_is_a_json_error() {
        assert!(matches!(
            RawListingPayload::from_bytes(b"<html>"),
            Err(PayloadError::Json(_))
        ));
    }
}
