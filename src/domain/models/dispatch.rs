// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::entry::Entry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 待发送的联系消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub recipient_address: String,
    pub display_name: String,
    pub entry_snapshot: Entry,
}

impl DispatchRecord {
    /// 从带邮箱的记录构造，邮箱为空时返回 `None`
    pub fn from_entry(entry: Entry) -> Option<Self> {
        let recipient_address = entry.email.trim().to_ascii_lowercase();
        if recipient_address.is_empty() {
            return None;
        }
        Some(Self {
            recipient_address,
            display_name: entry.title.clone(),
            entry_snapshot: entry,
        })
    }
}

/// 发送结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendStatus {
    Sent,
    Failed(String),
}

impl SendStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendStatus::Sent)
    }

    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("sent") {
            SendStatus::Sent
        } else {
            let reason = raw
                .strip_prefix("error:")
                .map(str::trim)
                .unwrap_or(raw);
            SendStatus::Failed(reason.to_string())
        }
    }
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendStatus::Sent => write!(f, "sent"),
            SendStatus::Failed(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// 发送日志中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendLogRecord {
    pub name: String,
    pub email: String,
    pub status: String,
    pub template: String,
    pub logged_at: DateTime<Utc>,
}
