// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::entry::Entry;
use crate::domain::models::task::{Priority, Task, TaskKind};
use crate::domain::services::email_extractor::first_valid_email;
use crate::engines::traits::{EngineError, FetchRequest};
use crate::tasks::{FetchedPage, TaskOutput};
use crate::utils::url_utils::explicit_scheme;
use std::time::Duration;
use tracing::debug;
use url::Url;
use uuid::Uuid;

const EMAIL_MAX_RETRIES: u32 = 0;

/// 商户任务交给邮箱任务的部分记录
///
/// 记录的所有权随令牌转移，只有邮箱任务能产出最终记录
#[derive(Debug)]
pub struct EmailContinuation {
    entry: Entry,
}

impl EmailContinuation {
    pub(crate) fn new(entry: Entry) -> Self {
        Self { entry }
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// 填入邮箱并交出最终记录
    pub fn finish(self, email: String) -> Entry {
        Entry {
            email,
            ..self.entry
        }
    }

    /// 不带邮箱交出记录
    pub fn abandon(self) -> Entry {
        self.entry
    }
}

/// 邮箱任务：抓取网站首页并提取联系邮箱
#[derive(Debug)]
pub struct EmailTask {
    pub meta: Task,
    pub continuation: EmailContinuation,
}

impl EmailTask {
    pub fn new(parent_id: Uuid, continuation: EmailContinuation) -> Self {
        let url = site_root(continuation.entry());
        Self {
            meta: Task::new(
                TaskKind::Email,
                Some(parent_id),
                url,
                EMAIL_MAX_RETRIES,
                Priority::High,
            ),
            continuation,
        }
    }

    pub fn fetch_request(&self, timeout: Duration) -> FetchRequest {
        FetchRequest::get(&self.meta.url, timeout)
    }

    /// 提取邮箱，取页面失败时原样交出记录
    pub fn process(self, page: Result<FetchedPage, EngineError>) -> TaskOutput {
        let page = match page {
            Ok(page) if (200..300).contains(&page.status_code) => page,
            Ok(page) => {
                debug!("Email fetch of {} returned {}", self.meta.url, page.status_code);
                return TaskOutput::terminal(self.continuation.abandon());
            }
            Err(e) => {
                debug!("Email fetch of {} failed: {}", self.meta.url, e);
                return TaskOutput::terminal(self.continuation.abandon());
            }
        };

        let email = first_valid_email(&page.body);
        if email.is_empty() {
            debug!("No usable email on {}", self.meta.url);
        }
        TaskOutput::terminal(self.continuation.finish(email))
    }
}

/// 网站首页地址；没有显式协议时使用解析出的协议
fn site_root(entry: &Entry) -> String {
    let website = entry.website.trim();
    let raw = if explicit_scheme(website).is_some() {
        website.to_string()
    } else if entry.enrichment.protocol == "http" {
        format!("http://{}", website)
    } else {
        format!("https://{}", website)
    };
    Url::parse(&raw).map(|u| u.to_string()).unwrap_or(raw)
}
