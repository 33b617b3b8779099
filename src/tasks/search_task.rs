// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::query::ListingQuery;
use crate::domain::models::task::{Priority, Task, TaskKind};
use crate::engines::traits::{PageAction, RenderRequest};
use crate::tasks::{FetchedPage, PipelineTask, PlaceTask, TaskError, TaskOutput};
use crate::utils::url_utils::resolve_url;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

const SEARCH_ENDPOINT: &str = "https://www.google.com/maps/search/";
const SEARCH_MAX_RETRIES: u32 = 3;

/// 拒绝 Cookie 的按钮
pub const CONSENT_REJECT_SELECTOR: &str =
    r#"form[action="https://consent.google.com/save"]:first-of-type button:first-of-type"#;
const CONSENT_WAIT: Duration = Duration::from_millis(500);
/// 可滚动的结果列表
pub const FEED_SELECTOR: &str = "div[role='feed']";

static PLACE_LINK: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div[role=feed] div[jsaction]>a").expect("Failed to compile place link selector")
});

/// 搜索任务：渲染结果列表并为每个商户链接产生一个商户任务
#[derive(Debug)]
pub struct SearchTask {
    pub meta: Task,
    pub query: ListingQuery,
}

impl SearchTask {
    pub fn new(query: ListingQuery) -> Self {
        let url = format!(
            "{}{}?hl={}",
            SEARCH_ENDPOINT,
            urlencoding::encode(&query.search_text()),
            urlencoding::encode(&query.language_code)
        );
        Self {
            meta: Task::new(TaskKind::Search, None, url, SEARCH_MAX_RETRIES, Priority::Low),
            query,
        }
    }

    pub fn render_request(&self, timeout: Duration) -> RenderRequest {
        let mut request = RenderRequest::new(&self.meta.url, timeout);
        request.actions = vec![
            PageAction::ClickIfPresent {
                selector: CONSENT_REJECT_SELECTOR.to_string(),
                timeout: CONSENT_WAIT,
            },
            PageAction::ScrollFeed {
                selector: FEED_SELECTOR.to_string(),
                max_depth: self.query.max_scroll_depth,
            },
        ];
        request
    }

    /// 解析结果列表
    ///
    /// 如果页面已经跳转到单个商户详情，则只产生该商户的任务。
    /// 搜索任务本身从不产生终态记录。
    pub fn process(self, page: FetchedPage) -> Result<TaskOutput, TaskError> {
        let links = if page.final_url.contains("/maps/place/") {
            vec![page.final_url.clone()]
        } else {
            place_links(&page.body, &page.final_url)
        };
        debug!(
            "Search {:?} yielded {} place links",
            self.query.search_text(),
            links.len()
        );

        let children = links
            .into_iter()
            .map(|link| {
                PipelineTask::Place(PlaceTask::new(
                    Some(self.meta.id),
                    &link,
                    self.query.extract_email,
                ))
            })
            .collect();
        Ok(TaskOutput::spawn(children))
    }
}

/// 结果列表中的商户链接，相对链接按页面地址解析
fn place_links(html: &str, base: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&PLACE_LINK)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter_map(|href| match resolve_url(base, href) {
            Ok(url) => Some(url.to_string()),
            Err(_) if href.starts_with("http") => Some(href.to_string()),
            Err(_) => None,
        })
        .collect()
}
