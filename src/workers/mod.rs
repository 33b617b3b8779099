// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供外发消息的发送能力与限速发送队列
pub mod dispatch_queue;
pub mod mailer;

pub use dispatch_queue::{DispatchContext, DispatchQueue, DispatchSummary, Throttle, ThrottlePolicy};
pub use mailer::{LogMailer, Mailer, MailerError, OutgoingMessage};
