// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::DispatchSettings;
use crate::domain::models::dispatch::{DispatchRecord, SendLogRecord, SendStatus};
use crate::domain::services::template_selector::MessageTemplates;
use crate::infrastructure::curation_log::CsvLogError;
use crate::infrastructure::send_log::{OptOutList, SendLog};
use crate::utils::retry_policy::{sleep_or_cancel, Cancelled};
use crate::workers::mailer::{Mailer, OutgoingMessage};
use chrono::{NaiveDate, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 外发队列错误
#[derive(Error, Debug)]
pub enum DispatchError {
    /// 队列已关闭
    #[error("dispatch queue closed")]
    Closed,

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// 发送日志写入失败，结果无法持久化
    #[error("failed to record send outcome: {0}")]
    Log(#[from] CsvLogError),
}

/// 单条记录的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Failed(String),
    OptedOut,
    ExcludedDomain,
    AlreadySent,
}

impl DispatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::Sent => "sent",
            DispatchOutcome::Failed(_) => "failed",
            DispatchOutcome::OptedOut => "opted_out",
            DispatchOutcome::ExcludedDomain => "excluded_domain",
            DispatchOutcome::AlreadySent => "already_sent",
        }
    }
}

/// 发送节奏限制
#[derive(Debug, Clone)]
pub struct ThrottlePolicy {
    /// 每小时最多发送数，0 表示不限
    pub sends_per_hour: u32,
    /// 每个自然日（UTC）最多发送数，0 表示不限
    pub daily_cap: u32,
    /// 每发送 N 封暂停一次，0 表示不暂停
    pub pause_every: u32,
    pub pause: Duration,
}

impl From<&DispatchSettings> for ThrottlePolicy {
    fn from(settings: &DispatchSettings) -> Self {
        Self {
            sends_per_hour: settings.sends_per_hour,
            daily_cap: settings.daily_cap,
            pause_every: settings.pause_every,
            pause: Duration::from_secs(settings.pause_secs),
        }
    }
}

struct ThrottleState {
    day: NaiveDate,
    sent_today: u32,
    since_pause: u32,
}

/// 发送节流器
///
/// 每小时速率由令牌桶控制；另有每日上限和每 N 封后的暂停。
/// 各工作协程依次领取发送许可。
pub struct Throttle {
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    policy: ThrottlePolicy,
    state: Mutex<ThrottleState>,
}

impl Throttle {
    pub fn new(policy: ThrottlePolicy) -> Self {
        // 单令牌桶：均匀间隔 3600/N 秒，不允许突发
        let limiter = NonZeroU32::new(policy.sends_per_hour).map(|per_hour| {
            RateLimiter::direct(Quota::per_hour(per_hour).allow_burst(NonZeroU32::MIN))
        });
        Self {
            limiter,
            policy,
            state: Mutex::new(ThrottleState {
                day: Utc::now().date_naive(),
                sent_today: 0,
                since_pause: 0,
            }),
        }
    }

    /// 等待下一次发送许可
    ///
    /// # 参数
    ///
    /// * `cancel` - 取消信号，等待期间收到时立即返回
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 可以发送
    /// * `Err(Cancelled)` - 等待被取消
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        let mut state = self.state.lock().await;

        let today = Utc::now().date_naive();
        if today != state.day {
            state.day = today;
            state.sent_today = 0;
        }

        if self.policy.daily_cap > 0 && state.sent_today >= self.policy.daily_cap {
            let wait = until_next_day();
            info!(
                "Daily cap of {} reached, waiting {}s",
                self.policy.daily_cap,
                wait.as_secs()
            );
            sleep_or_cancel(wait, cancel).await?;
            state.day = Utc::now().date_naive();
            state.sent_today = 0;
            state.since_pause = 0;
        }

        if self.policy.pause_every > 0 && state.since_pause >= self.policy.pause_every {
            info!(
                "Pausing {}s after {} sends",
                self.policy.pause.as_secs(),
                state.since_pause
            );
            sleep_or_cancel(self.policy.pause, cancel).await?;
            state.since_pause = 0;
        }

        if let Some(limiter) = &self.limiter {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Cancelled),
                _ = limiter.until_ready() => {}
            }
        }

        state.sent_today += 1;
        state.since_pause += 1;
        Ok(())
    }
}

fn until_next_day() -> Duration {
    let now = Utc::now();
    now.date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|midnight| (midnight - now.naive_utc()).to_std().ok())
        .unwrap_or(Duration::from_secs(60))
}

/// 工作协程共享的发送上下文
pub struct DispatchContext {
    pub mailer: Arc<dyn Mailer>,
    pub templates: Arc<MessageTemplates>,
    pub send_log: Arc<SendLog>,
    pub opt_out: Arc<OptOutList>,
    pub excluded_suffixes: Vec<String>,
    pub performance_threshold: u8,
    pub throttle: Arc<Throttle>,
    pub cancel: CancellationToken,
}

impl DispatchContext {
    /// 地址的域名是否命中排除后缀
    fn is_excluded_domain(&self, address: &str) -> bool {
        let Some((_, domain)) = address.rsplit_once('@') else {
            return true;
        };
        let domain = domain.trim().to_ascii_lowercase();
        self.excluded_suffixes.iter().any(|suffix| {
            let suffix = suffix.trim().trim_start_matches('.').to_ascii_lowercase();
            !suffix.is_empty() && (domain == suffix || domain.ends_with(&format!(".{}", suffix)))
        })
    }

    /// 处理一条外发记录
    ///
    /// 依次检查退订、排除后缀与发送日志；通过后等待节流许可、渲染模板并发送。
    /// 发送结果无论成败都只写入发送日志一次。
    ///
    /// # 参数
    ///
    /// * `record` - 外发记录
    ///
    /// # 返回值
    ///
    /// * `Ok(DispatchOutcome)` - 处理结果
    /// * `Err(DispatchError)` - 被取消或发送日志写入失败
    pub async fn deliver(&self, record: DispatchRecord) -> Result<DispatchOutcome, DispatchError> {
        let address = record.recipient_address.as_str();

        if self.opt_out.contains(address) {
            return Ok(DispatchOutcome::OptedOut);
        }
        if self.is_excluded_domain(address) {
            return Ok(DispatchOutcome::ExcludedDomain);
        }
        if self.send_log.already_sent(address) || !self.send_log.try_claim(address) {
            return Ok(DispatchOutcome::AlreadySent);
        }

        if let Err(e) = self.throttle.acquire(&self.cancel).await {
            self.send_log.release(address);
            return Err(e.into());
        }

        let rendered = self
            .templates
            .render(&record.entry_snapshot, self.performance_threshold);
        let message = OutgoingMessage {
            to: record.recipient_address.clone(),
            display_name: record.display_name.clone(),
            subject: rendered.subject,
            body: rendered.body,
        };

        let status = match self.mailer.send(&message).await {
            Ok(()) => SendStatus::Sent,
            Err(e) => SendStatus::Failed(e.to_string()),
        };
        self.send_log.record_outcome(SendLogRecord {
            name: record.display_name,
            email: record.recipient_address,
            status: status.to_string(),
            template: rendered.kind.to_string(),
            logged_at: Utc::now(),
        })?;

        Ok(match status {
            SendStatus::Sent => DispatchOutcome::Sent,
            SendStatus::Failed(reason) => DispatchOutcome::Failed(reason),
        })
    }
}

/// 外发统计
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub sent: AtomicUsize,
    pub failed: AtomicUsize,
    pub skipped: AtomicUsize,
}

/// 外发统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl DispatchStats {
    fn snapshot(&self) -> DispatchSummary {
        DispatchSummary {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// 外发队列
///
/// 有界通道加固定数量的工作协程，所有协程共享一个接收端。
pub struct DispatchQueue {
    sender: mpsc::Sender<DispatchRecord>,
    workers: JoinSet<()>,
    stats: Arc<DispatchStats>,
}

impl DispatchQueue {
    /// 启动工作协程
    ///
    /// # 参数
    ///
    /// * `context` - 共享发送上下文
    /// * `workers` - 工作协程数量
    /// * `capacity` - 队列容量，满时 `submit` 等待
    pub fn start(context: Arc<DispatchContext>, workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let stats = Arc::new(DispatchStats::default());

        let mut set = JoinSet::new();
        for worker_id in 0..workers.max(1) {
            let receiver = receiver.clone();
            let context = context.clone();
            let stats = stats.clone();
            set.spawn(async move {
                debug!("Dispatch worker {} started", worker_id);
                run_worker(worker_id, receiver, context, stats).await;
                debug!("Dispatch worker {} stopped", worker_id);
            });
        }

        Self {
            sender,
            workers: set,
            stats,
        }
    }

    /// 提交一条记录，队列满时等待
    pub async fn submit(&self, record: DispatchRecord) -> Result<(), DispatchError> {
        self.sender
            .send(record)
            .await
            .map_err(|_| DispatchError::Closed)
    }

    /// 关闭队列并等待所有已提交记录处理完毕
    pub async fn close(self) -> DispatchSummary {
        let Self {
            sender,
            mut workers,
            stats,
        } = self;
        drop(sender);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Dispatch worker failed: {}", e);
            }
        }
        stats.snapshot()
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<DispatchRecord>>>,
    context: Arc<DispatchContext>,
    stats: Arc<DispatchStats>,
) {
    loop {
        let record = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = context.cancel.cancelled() => None,
                record = receiver.recv() => record,
            }
        };
        let Some(record) = record else {
            break;
        };

        let address = record.recipient_address.clone();
        match context.deliver(record).await {
            Ok(outcome) => {
                metrics::counter!("dispatch_total", "outcome" => outcome.label()).increment(1);
                match &outcome {
                    DispatchOutcome::Sent => {
                        stats.sent.fetch_add(1, Ordering::Relaxed);
                        info!("Worker {} sent to {}", worker_id, address);
                    }
                    DispatchOutcome::Failed(reason) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        warn!("Worker {} failed to send to {}: {}", worker_id, address, reason);
                    }
                    skipped => {
                        stats.skipped.fetch_add(1, Ordering::Relaxed);
                        debug!("Skipping {}: {:?}", address, skipped);
                    }
                }
            }
            Err(DispatchError::Cancelled(_)) => break,
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                error!("Worker {} could not dispatch to {}: {}", worker_id, address, e);
            }
        }
    }
}
