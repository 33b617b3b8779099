// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sitescout::config::settings::Settings;
use sitescout::config::tables::LookupTables;
use sitescout::domain::models::dispatch::DispatchRecord;
use sitescout::domain::models::query::ListingQuery;
use sitescout::domain::services::enrichment_service::EnrichmentService;
use sitescout::domain::services::template_selector::MessageTemplates;
use sitescout::engines::chromium_engine::ChromiumEngine;
use sitescout::engines::reqwest_engine::ReqwestEngine;
use sitescout::engines::traits::{BrowserEngine, Fetcher};
use sitescout::infrastructure::dns::HickoryDns;
use sitescout::infrastructure::result_sink::{load_entries, ResultSink};
use sitescout::infrastructure::seed_reader::{read_keywords, read_localities};
use sitescout::infrastructure::send_log::{OptOutList, SendLog};
use sitescout::queue::{InMemoryTaskQueue, PipelineScheduler};
use sitescout::tasks::PipelineContext;
use sitescout::utils::telemetry;
use sitescout::workers::{DispatchContext, DispatchQueue, LogMailer, Throttle, ThrottlePolicy};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "sitescout", version, about = "Business listing enrichment pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 搜索商户并富化，结果写入 CSV
    Scrape {
        /// 关键词文件（`;` 分隔，含 keyword 列）
        #[arg(long, value_name = "FILE")]
        keywords: PathBuf,
        /// 地区文件（`;` 分隔，含 locality 或 comuni 列）
        #[arg(long, value_name = "FILE")]
        localities: PathBuf,
        /// 覆盖配置中的输出路径
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// 读取结果 CSV 并通过外发队列发送（演练模式）
    Dispatch {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
    },
}

/// 主函数
///
/// 应用程序入口点，负责加载配置与查找表并执行子命令
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;
    telemetry::init_telemetry(settings.log.format.eq_ignore_ascii_case("json"));
    info!("Starting sitescout...");

    // 2. Ctrl-C cancels all in-flight work
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Shutdown signal received");
                signal_token.cancel();
            }
            Err(e) => error!("Unable to listen for shutdown signal: {}", e),
        }
    });

    match cli.command {
        Command::Scrape {
            keywords,
            localities,
            output,
        } => scrape(&settings, keywords, localities, output, cancel).await,
        Command::Dispatch { input } => dispatch(&settings, input, cancel).await,
    }
}

async fn scrape(
    settings: &Settings,
    keywords: PathBuf,
    localities: PathBuf,
    output: Option<PathBuf>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let tables = LookupTables::load(&settings.tables)
        .inspect_err(|e| error!("Lookup tables unusable: {}", e))
        .context("Failed to load lookup tables")?;
    let tables = Arc::new(tables);
    info!(
        "Loaded {} platform signatures, {} excluded domains, {} hosting patterns",
        tables.platforms.len(),
        tables.excluded_domains.len(),
        tables.hosting_providers.len()
    );

    let keywords = read_keywords(&keywords)?;
    let localities = read_localities(&localities)?;
    let scraper = &settings.scraper;
    let queries = ListingQuery::combinations(
        &keywords,
        &localities,
        &scraper.language_code,
        scraper.max_scroll_depth,
        scraper.extract_email,
    );
    if queries.is_empty() {
        warn!("No keyword/locality combinations to search");
        return Ok(());
    }

    let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestEngine::new(&settings.http.user_agent)?);
    let browser: Arc<dyn BrowserEngine> = Arc::new(ChromiumEngine);
    let dns = Arc::new(HickoryDns::new(Duration::from_secs(
        settings.hosting.lookup_timeout_secs,
    )));
    let enricher = EnrichmentService::from_settings(
        settings,
        tables,
        fetcher.clone(),
        Some(browser.clone()),
        dns,
    )?;

    let output = output.unwrap_or_else(|| PathBuf::from(&scraper.output_path));
    let sink = Arc::new(
        ResultSink::create(&output)
            .with_context(|| format!("Failed to create {}", output.display()))?,
    );
    let context = PipelineContext {
        fetcher,
        browser,
        enricher: Arc::new(enricher),
        page_timeout: settings.http.request_timeout(),
        browser_timeout: settings.http.browser_timeout(),
        cancel,
    };

    let scheduler = PipelineScheduler::new(
        Arc::new(InMemoryTaskQueue::new()),
        context,
        sink,
        scraper.concurrency,
    );
    scheduler.seed(queries).await?;
    let summary = scheduler.run().await?;
    info!(
        "Wrote {} records to {} ({} tasks failed)",
        summary.written,
        output.display(),
        summary.failed
    );
    Ok(())
}

async fn dispatch(settings: &Settings, input: PathBuf, cancel: CancellationToken) -> anyhow::Result<()> {
    let config = &settings.dispatch;
    let templates = MessageTemplates::load(&settings.tables.message_templates)
        .inspect_err(|e| error!("Message templates unusable: {}", e))
        .context("Failed to load message templates")?;
    let records: Vec<DispatchRecord> = load_entries(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?
        .into_iter()
        .filter_map(DispatchRecord::from_entry)
        .collect();
    info!("Loaded {} records with an email address", records.len());

    let context = Arc::new(DispatchContext {
        mailer: Arc::new(LogMailer),
        templates: Arc::new(templates),
        send_log: Arc::new(SendLog::open(&config.send_log_path)?),
        opt_out: Arc::new(OptOutList::load(&config.opt_out_path)?),
        excluded_suffixes: config.excluded_suffixes.clone(),
        performance_threshold: config.performance_threshold,
        throttle: Arc::new(Throttle::new(ThrottlePolicy::from(config))),
        cancel: cancel.clone(),
    });

    let queue = DispatchQueue::start(context, config.workers, config.queue_capacity);
    for record in records {
        if cancel.is_cancelled() || queue.submit(record).await.is_err() {
            break;
        }
    }
    let summary = queue.close().await;
    info!(
        "Dispatch finished: {} sent, {} failed, {} skipped",
        summary.sent, summary.failed, summary.skipped
    );
    Ok(())
}
