// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{config_path, RecordingMailer};
use sitescout::domain::models::dispatch::DispatchRecord;
use sitescout::domain::models::entry::{Enrichment, Entry};
use sitescout::domain::services::template_selector::MessageTemplates;
use sitescout::infrastructure::result_sink::{load_entries, ResultSink};
use sitescout::infrastructure::send_log::{OptOutList, SendLog};
use sitescout::workers::{DispatchContext, DispatchQueue, DispatchSummary, Throttle, ThrottlePolicy};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn entry(title: &str, email: &str, phone: &str, maintenance: bool) -> Entry {
    Entry {
        title: title.into(),
        website: format!("https://{}.it", title.to_lowercase().replace(' ', "-")),
        email: email.into(),
        phone: phone.into(),
        enrichment: Enrichment {
            protocol: "https".into(),
            technology: "WordPress".into(),
            hosting_provider: "Aruba S.p.A.".into(),
            availability: "available".into(),
            maintenance: Some(maintenance),
            cookie_banner: Some(true),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// 先用结果输出写出一个批次，再读回成外发记录
fn write_batch(path: &Path) -> Vec<DispatchRecord> {
    let sink = ResultSink::create(path).unwrap();
    for e in [
        entry("Pizzeria Roma", "Info@Roma.it", "0832 1", false),
        entry("Bar Lavori", "lavori@bar.it", "0832 2", true),
        entry("Studio Legale", "studio@legale.pec.it", "0832 3", false),
        entry("Trattoria Stop", "stop@trattoria.it", "0832 4", false),
        entry("Forno Rotto", "forno@rotto.it", "0832 5", false),
        entry("Senza Email", "", "0832 6", false),
    ] {
        sink.admit(&e).unwrap();
    }
    sink.finish().unwrap();

    load_entries(path)
        .unwrap()
        .into_iter()
        .filter_map(DispatchRecord::from_entry)
        .collect()
}

fn context(dir: &TempDir, mailer: Arc<RecordingMailer>, cancel: CancellationToken) -> Arc<DispatchContext> {
    let opt_out = dir.path().join("opt_out.txt");
    std::fs::write(&opt_out, "# unsubscribed\nSTOP@trattoria.it\n").unwrap();

    Arc::new(DispatchContext {
        mailer,
        templates: Arc::new(MessageTemplates::load(config_path("message_templates.json")).unwrap()),
        send_log: Arc::new(SendLog::open(dir.path().join("send_log.csv")).unwrap()),
        opt_out: Arc::new(OptOutList::load(&opt_out).unwrap()),
        excluded_suffixes: vec!["pec.it".into()],
        performance_threshold: 75,
        throttle: Arc::new(Throttle::new(ThrottlePolicy {
            sends_per_hour: 0,
            daily_cap: 0,
            pause_every: 0,
            pause: Duration::ZERO,
        })),
        cancel,
    })
}

async fn dispatch_all(ctx: Arc<DispatchContext>, records: Vec<DispatchRecord>) -> DispatchSummary {
    let queue = DispatchQueue::start(ctx, 3, 2);
    for record in records {
        queue.submit(record).await.unwrap();
    }
    queue.close().await
}

#[tokio::test]
async fn test_batch_dispatch_and_resume() {
    let dir = TempDir::new().unwrap();
    let records = write_batch(&dir.path().join("results.csv"));
    assert_eq!(records.len(), 5);

    // first run: one mailbox rejects the message
    let mailer = Arc::new(RecordingMailer {
        reject: Some("forno@rotto.it".into()),
        ..Default::default()
    });
    let summary = dispatch_all(
        context(&dir, mailer.clone(), CancellationToken::new()),
        records.clone(),
    )
    .await;

    assert_eq!(summary, DispatchSummary { sent: 2, failed: 1, skipped: 2 });
    assert_eq!(
        mailer.recipients(),
        vec!["forno@rotto.it", "info@roma.it", "lavori@bar.it"]
    );
    let lavori = mailer
        .sent
        .lock()
        .iter()
        .find(|m| m.to == "lavori@bar.it")
        .cloned()
        .unwrap();
    assert!(lavori.subject.contains("manutenzione"));
    assert_eq!(lavori.display_name, "Bar Lavori");

    // second run over the same log: only the failed address is retried
    let mailer = Arc::new(RecordingMailer::default());
    let summary = dispatch_all(context(&dir, mailer.clone(), CancellationToken::new()), records).await;

    assert_eq!(summary, DispatchSummary { sent: 1, failed: 0, skipped: 4 });
    assert_eq!(mailer.recipients(), vec!["forno@rotto.it"]);

    let log = std::fs::read_to_string(dir.path().join("send_log.csv")).unwrap();
    let rows: Vec<&str> = log.lines().skip(1).collect();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows.iter().filter(|r| r.contains("forno@rotto.it")).count(), 2);
}

#[tokio::test]
async fn test_cancelled_batch_sends_nothing() {
    let dir = TempDir::new().unwrap();
    let records = write_batch(&dir.path().join("results.csv"));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mailer = Arc::new(RecordingMailer::default());
    let queue = DispatchQueue::start(context(&dir, mailer.clone(), cancel), 2, 10);
    for record in records {
        let _ = queue.submit(record).await;
    }
    let summary = queue.close().await;

    assert_eq!(summary.sent, 0);
    assert!(mailer.sent.lock().is_empty());
}
