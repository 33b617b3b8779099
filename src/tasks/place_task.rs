// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::payload::RawListingPayload;
use crate::domain::models::task::{Priority, Task, TaskKind};
use crate::engines::traits::{PageAction, RenderRequest};
use crate::tasks::search_task::CONSENT_REJECT_SELECTOR;
use crate::tasks::{
    EmailContinuation, EmailTask, FetchedPage, PipelineContext, PipelineTask, TaskError, TaskOutput,
};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const PLACE_MAX_RETRIES: u32 = 3;

/// 页面初始化状态中保存商户详情的位置
pub const LISTING_STATE_SCRIPT: &str = "window.APP_INITIALIZATION_STATE[3][6]";

/// 商户任务：读取详情载荷，富化后产出记录或邮箱任务
#[derive(Debug)]
pub struct PlaceTask {
    pub meta: Task,
    pub extract_email: bool,
}

impl PlaceTask {
    pub fn new(parent_id: Option<Uuid>, url: &str, extract_email: bool) -> Self {
        Self {
            meta: Task::new(
                TaskKind::Place,
                parent_id,
                url.to_string(),
                PLACE_MAX_RETRIES,
                Priority::Medium,
            ),
            extract_email,
        }
    }

    /// 只接受绝对的 http(s) 地址
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.meta.url.starts_with("http") {
            Ok(())
        } else {
            Err(TaskError::Invalid(format!("invalid place URL: {:?}", self.meta.url)))
        }
    }

    pub fn render_request(&self, timeout: Duration) -> RenderRequest {
        let mut request = RenderRequest::new(&self.meta.url, timeout);
        request.actions = vec![PageAction::ClickIfPresent {
            selector: CONSENT_REJECT_SELECTOR.to_string(),
            timeout: Duration::from_millis(500),
        }];
        request.evaluate = Some(LISTING_STATE_SCRIPT.to_string());
        request
    }

    /// 解析并富化商户记录
    ///
    /// # 参数
    ///
    /// * `page` - 渲染结果，`evaluated` 中应为详情载荷
    /// * `ctx` - 执行上下文
    ///
    /// # 返回值
    ///
    /// * `Ok(TaskOutput)` - 需要邮箱时只产生一个邮箱任务，否则产出终态记录
    /// * `Err(TaskError::Payload)` - 载荷缺失或结构不符
    pub async fn process(
        self,
        page: FetchedPage,
        ctx: &PipelineContext,
    ) -> Result<TaskOutput, TaskError> {
        let payload = RawListingPayload::from_value(page.evaluated.unwrap_or(Value::Null))?;
        let mut entry = payload.into_entry(&self.meta.url)?;
        if let Some(parent) = self.meta.parent_id {
            entry.id = parent.to_string();
        }

        if ctx.enricher.is_excluded(&entry.website) {
            debug!("Skipping enrichment of {:?} ({:?})", entry.title, entry.website);
            return Ok(TaskOutput::terminal(entry));
        }

        entry.enrichment = ctx.enricher.enrich(&entry.website, &ctx.cancel).await;
        info!(
            "Enriched {:?}: {} / {} / {}",
            entry.title,
            entry.enrichment.technology,
            entry.enrichment.hosting_provider,
            entry.enrichment.availability
        );

        if self.extract_email {
            let email = EmailTask::new(self.meta.id, EmailContinuation::new(entry));
            return Ok(TaskOutput::spawn(vec![PipelineTask::Email(email)]));
        }
        Ok(TaskOutput::terminal(entry))
    }
}
