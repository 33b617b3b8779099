// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{enrichment_service, listing_page, results_page, RoutedBrowser};
use sitescout::domain::models::query::ListingQuery;
use sitescout::engines::reqwest_engine::ReqwestEngine;
use sitescout::engines::traits::Fetcher;
use sitescout::infrastructure::result_sink::{load_entries, ResultSink};
use sitescout::queue::{InMemoryTaskQueue, PipelineScheduler};
use sitescout::tasks::{PipelineContext, SearchTask};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SITE_BODY: &str = r#"<html><head><title>Sito in costruzione</title>
<link rel="stylesheet" href="/wp-content/themes/pizza/style.css"></head>
<body><a href="/privacy">Cookie Policy</a>
<p>Scrivici: <a href="mailto:Info@Pizzeria-Uno.it">Info@Pizzeria-Uno.it</a></p></body></html>"#;

fn query(extract_email: bool) -> ListingQuery {
    ListingQuery {
        keyword: "pizzeria".into(),
        locality: "Lecce".into(),
        language_code: "it".into(),
        max_scroll_depth: 2,
        extract_email,
    }
}

fn scheduler(
    browser: Arc<RoutedBrowser>,
    output: &Path,
    cancel: CancellationToken,
) -> PipelineScheduler<InMemoryTaskQueue, std::fs::File> {
    let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestEngine::new("sitescout-test").unwrap());
    let context = PipelineContext {
        fetcher: fetcher.clone(),
        browser,
        enricher: Arc::new(enrichment_service(fetcher)),
        page_timeout: Duration::from_secs(2),
        browser_timeout: Duration::from_secs(2),
        cancel,
    };
    PipelineScheduler::new(
        Arc::new(InMemoryTaskQueue::new()),
        context,
        Arc::new(ResultSink::create(output).unwrap()),
        2,
    )
}

#[tokio::test]
async fn test_search_to_csv_with_email_extraction() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SITE_BODY))
        .mount(&site)
        .await;
    let gone = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nothing here"))
        .mount(&gone)
        .await;

    let search_url = SearchTask::new(query(true)).meta.url;
    let places = [
        "https://www.google.com/maps/place/uno",
        "https://www.google.com/maps/place/uno-bis",
        "https://www.google.com/maps/place/social",
        "https://www.google.com/maps/place/chiusa",
    ];
    let browser = Arc::new(RoutedBrowser::default());
    browser
        .route(&search_url, results_page(&search_url, &places))
        .route(places[0], listing_page(places[0], "Pizzeria Uno", &site.uri(), "0832 123456"))
        // same business listed twice under a differently cased name
        .route(places[1], listing_page(places[1], "PIZZERIA UNO ", &site.uri(), "0832 999999"))
        .route(
            places[2],
            listing_page(places[2], "Pizza Social", "https://www.facebook.com/pizzasocial", "0832 1"),
        )
        .route(places[3], listing_page(places[3], "Pizzeria Chiusa", &gone.uri(), "0832 2"));

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out").join("results.csv");
    let scheduler = scheduler(browser.clone(), &output, CancellationToken::new());
    scheduler.seed(vec![query(true)]).await.unwrap();

    let summary = scheduler.run().await.unwrap();

    assert!(!summary.cancelled);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.written, 2);
    for place in places {
        assert_eq!(browser.calls_to(place), 1);
    }

    let entries = load_entries(&output).unwrap();
    assert_eq!(entries.len(), 2);

    let uno = entries
        .iter()
        .find(|e| e.title.trim().eq_ignore_ascii_case("pizzeria uno"))
        .unwrap();
    assert_eq!(uno.email, "info@pizzeria-uno.it");
    assert_eq!(uno.city, "Lecce");
    assert_eq!(uno.province, "Lecce");
    assert_eq!(uno.enrichment.protocol, "http");
    assert_eq!(uno.enrichment.technology, "WordPress");
    assert_eq!(uno.enrichment.hosting_provider, "Aruba S.p.A.");
    assert_eq!(uno.enrichment.availability, "available");
    assert_eq!(uno.enrichment.maintenance, Some(true));
    assert_eq!(uno.enrichment.cookie_banner, Some(true));

    let chiusa = entries.iter().find(|e| e.title == "Pizzeria Chiusa").unwrap();
    assert_eq!(chiusa.email, "");
    assert_eq!(chiusa.enrichment.availability, "not found");
    assert_eq!(chiusa.enrichment.maintenance, None);

    assert!(entries.iter().all(|e| e.title != "Pizza Social"));
}

#[tokio::test]
async fn test_without_email_extraction_site_root_is_not_scanned_for_emails() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SITE_BODY))
        .mount(&site)
        .await;

    let search_url = SearchTask::new(query(false)).meta.url;
    let place = "https://www.google.com/maps/place/uno";
    let browser = Arc::new(RoutedBrowser::default());
    browser
        .route(&search_url, results_page(&search_url, &[place]))
        .route(place, listing_page(place, "Pizzeria Uno", &site.uri(), "0832 123456"));

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("results.csv");
    let scheduler = scheduler(browser, &output, CancellationToken::new());
    scheduler.seed(vec![query(false)]).await.unwrap();
    let summary = scheduler.run().await.unwrap();

    // search and place only
    assert_eq!(summary.completed, 2);
    let entries = load_entries(&output).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].email, "");
    assert_eq!(entries[0].enrichment.technology, "WordPress");
}

#[tokio::test]
async fn test_unreachable_search_page_exhausts_retries() {
    let browser = Arc::new(RoutedBrowser::default());
    let search_url = SearchTask::new(query(true)).meta.url;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("results.csv");
    let scheduler = scheduler(browser.clone(), &output, CancellationToken::new());
    scheduler.seed(vec![query(true)]).await.unwrap();
    let summary = scheduler.run().await.unwrap();

    assert_eq!(browser.calls_to(&search_url), 4);
    assert_eq!(summary.retried, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.written, 0);
    assert!(load_entries(&output).unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_run_stops_without_writing() {
    let browser = Arc::new(RoutedBrowser::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("results.csv");
    let scheduler = scheduler(browser, &output, cancel);
    scheduler.seed(vec![query(true)]).await.unwrap();
    let summary = scheduler.run().await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.written, 0);
}
