// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::retry_policy::Cancelled;
use std::fmt;
use thiserror::Error;

/// 未找到托管商时的哨兵值
pub const UNKNOWN_PROVIDER: &str = "Unknown";
/// 未识别出平台时的哨兵值
pub const OTHER_PLATFORM: &str = "Other";
/// 协议无法确定时写入记录的标签
pub const UNDETERMINED_PROTOCOL: &str = "undetermined";

/// 级联中单个阶段的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// 找到结果
    Found(T),
    /// 查询成功但没有结果
    NotFound,
    /// 瞬时故障（超时、连接失败、5xx），可重试
    Transient(String),
    /// 不可恢复的故障（缺少密钥、响应格式错误），跳过该阶段
    Fatal(String),
}

impl<T> Resolution<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    /// 用于日志与指标的结果名
    pub fn outcome(&self) -> &'static str {
        match self {
            Resolution::Found(_) => "found",
            Resolution::NotFound => "not_found",
            Resolution::Transient(_) => "transient_error",
            Resolution::Fatal(_) => "fatal_error",
        }
    }
}

impl<T: fmt::Display> fmt::Display for Resolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Found(v) => write!(f, "found: {}", v),
            Resolution::NotFound => write!(f, "not found"),
            Resolution::Transient(e) => write!(f, "transient error: {}", e),
            Resolution::Fatal(e) => write!(f, "fatal error: {}", e),
        }
    }
}

/// 解析器错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// 安全与明文协议都没有返回成功状态
    #[error("protocol undetermined for {0}")]
    ProtocolUndetermined(String),

    /// 输入无法解析
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// 被外部取消
    #[error("cancelled")]
    Cancelled,
}

impl From<Cancelled> for ResolveError {
    fn from(_: Cancelled) -> Self {
        ResolveError::Cancelled
    }
}
