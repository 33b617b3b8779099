// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 任务图
//!
//! 搜索任务产生商户任务，商户任务在需要时产生邮箱任务。
//! 每个任务先声明如何取页面（`page_request`），再由调度器取回页面后调用 `process`。

pub mod email_task;
pub mod place_task;
pub mod search_task;

pub use email_task::{EmailContinuation, EmailTask};
pub use place_task::PlaceTask;
pub use search_task::SearchTask;

use crate::domain::models::entry::Entry;
use crate::domain::models::payload::PayloadError;
use crate::domain::models::task::{DomainError, Task, TaskKind};
use crate::domain::services::enrichment_service::Enricher;
use crate::engines::traits::{
    BrowserEngine, EngineError, FetchRequest, FetchResponse, Fetcher, RenderRequest, RenderedPage,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// 任务执行错误
#[derive(Error, Debug)]
pub enum TaskError {
    /// 取页面失败，可由调度器重试
    #[error("transport failure: {0}")]
    Transport(#[from] EngineError),

    /// 载荷结构不符，只中止当前任务
    #[error("malformed payload: {0}")]
    Payload(#[from] PayloadError),

    /// 任务参数无效
    #[error("invalid task: {0}")]
    Invalid(String),

    /// 任务执行过程中发生 panic
    #[error("task panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    State(#[from] DomainError),
}

impl TaskError {
    /// 是否应消耗重试预算后重新排队
    pub fn is_transport(&self) -> bool {
        matches!(self, TaskError::Transport(_))
    }
}

/// 任务需要的页面
#[derive(Debug, Clone)]
pub enum PageRequest {
    /// 通过无头浏览器渲染并执行页面动作
    Render(RenderRequest),
    /// 普通 HTTP 抓取
    Fetch(FetchRequest),
}

/// 取回的页面
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub status_code: u16,
    pub final_url: String,
    pub body: String,
    /// 浏览器脚本求值结果
    pub evaluated: Option<serde_json::Value>,
}

impl From<RenderedPage> for FetchedPage {
    fn from(page: RenderedPage) -> Self {
        Self {
            status_code: 200,
            final_url: page.final_url,
            body: page.html,
            evaluated: page.evaluated,
        }
    }
}

impl From<FetchResponse> for FetchedPage {
    fn from(response: FetchResponse) -> Self {
        Self {
            status_code: response.status_code,
            final_url: response.final_url,
            body: response.body,
            evaluated: None,
        }
    }
}

/// 任务执行时共享的只读上下文
#[derive(Clone)]
pub struct PipelineContext {
    pub fetcher: Arc<dyn Fetcher>,
    pub browser: Arc<dyn BrowserEngine>,
    pub enricher: Arc<dyn Enricher>,
    pub page_timeout: Duration,
    pub browser_timeout: Duration,
    pub cancel: CancellationToken,
}

impl PipelineContext {
    /// 执行页面请求
    pub async fn load(&self, request: &PageRequest) -> Result<FetchedPage, EngineError> {
        match request {
            PageRequest::Render(render) => self.browser.render(render).await.map(FetchedPage::from),
            PageRequest::Fetch(fetch) => self.fetcher.fetch(fetch).await.map(FetchedPage::from),
        }
    }
}

/// 一次处理的产出：可选的终态记录与子任务
#[derive(Debug, Default)]
pub struct TaskOutput {
    pub result: Option<Entry>,
    pub children: Vec<PipelineTask>,
}

impl TaskOutput {
    pub fn terminal(entry: Entry) -> Self {
        Self {
            result: Some(entry),
            children: Vec::new(),
        }
    }

    pub fn spawn(children: Vec<PipelineTask>) -> Self {
        Self {
            result: None,
            children,
        }
    }
}

/// 任务图中的任务
#[derive(Debug)]
pub enum PipelineTask {
    Search(SearchTask),
    Place(PlaceTask),
    Email(EmailTask),
}

impl PipelineTask {
    /// 任务元数据
    pub fn meta(&self) -> &Task {
        match self {
            PipelineTask::Search(t) => &t.meta,
            PipelineTask::Place(t) => &t.meta,
            PipelineTask::Email(t) => &t.meta,
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.meta().kind
    }

    fn meta_slot(&mut self) -> &mut Task {
        match self {
            PipelineTask::Search(t) => &mut t.meta,
            PipelineTask::Place(t) => &mut t.meta,
            PipelineTask::Email(t) => &mut t.meta,
        }
    }

    /// 对元数据执行一次状态转换
    pub fn transition(
        mut self,
        step: impl FnOnce(Task) -> Result<Task, DomainError>,
    ) -> Result<Self, DomainError> {
        let slot = self.meta_slot();
        let next = step(slot.clone())?;
        *slot = next;
        Ok(self)
    }

    /// 取页面前的参数检查，失败的任务不消耗重试预算
    pub fn validate(&self) -> Result<(), TaskError> {
        match self {
            PipelineTask::Place(t) => t.validate(),
            PipelineTask::Search(_) | PipelineTask::Email(_) => Ok(()),
        }
    }

    /// 取页面失败时是否仍交给 `process`（而不是重试）
    pub fn processes_fetch_errors(&self) -> bool {
        matches!(self, PipelineTask::Email(_))
    }

    /// 任务取页面的方式
    pub fn page_request(&self, ctx: &PipelineContext) -> PageRequest {
        match self {
            PipelineTask::Search(t) => PageRequest::Render(t.render_request(ctx.browser_timeout)),
            PipelineTask::Place(t) => PageRequest::Render(t.render_request(ctx.browser_timeout)),
            PipelineTask::Email(t) => PageRequest::Fetch(t.fetch_request(ctx.page_timeout)),
        }
    }

    /// 处理取回的页面
    ///
    /// # 参数
    ///
    /// * `page` - 页面或取页面时的错误
    /// * `ctx` - 执行上下文
    ///
    /// # 返回值
    ///
    /// * `Ok(TaskOutput)` - 终态记录和/或子任务
    /// * `Err(TaskError)` - 传输错误可重试，其余错误只中止当前任务
    pub async fn process(
        self,
        page: Result<FetchedPage, EngineError>,
        ctx: &PipelineContext,
    ) -> Result<TaskOutput, TaskError> {
        match self {
            PipelineTask::Search(t) => t.process(page?),
            PipelineTask::Place(t) => t.process(page?, ctx).await,
            PipelineTask::Email(t) => Ok(t.process(page)),
        }
    }
}
