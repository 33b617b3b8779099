// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// 发送错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailerError {
    /// 收件服务器拒收
    #[error("rejected: {0}")]
    Rejected(String),
    /// 网络或服务故障
    #[error("transport: {0}")]
    Transport(String),
}

/// 一封待发送的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub display_name: String,
    pub subject: String,
    pub body: String,
}

/// 发送能力
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), MailerError>;
}

/// 只记录日志不真正发送的实现，用于演练
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), MailerError> {
        info!(
            to = %message.to,
            name = %message.display_name,
            subject = %message.subject,
            "Dry run: message not sent"
        );
        tracing::debug!("{}", message.body);
        Ok(())
    }
}
