// tests/api_http.rs
//
// HTTP-level tests for the public API over a real listener.
//
// Covered:
// - GET  /health
// - GET/POST /api/sources (409 on duplicate url)
// - GET  /api/reports (default 7-day window)
// - GET/POST /api/tickers (409 on duplicate symbol)
// - GET  /api/tickers/{symbol}/summary (404 before a run, 200 after)
// - POST /api/tickers/run-daily (offline, no configured sources)

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value as Json};
use stock_report_hub::api::{self, AppState};
use stock_report_hub::config::Settings;
use stock_report_hub::fetch::RateLimitedFetcher;
use stock_report_hub::pipeline::PipelineOrchestrator;
use stock_report_hub::store::{content_hash, ContentStore, NewReport, SourceKind};
use stock_report_hub::summarize::SummaryEngine;
use stock_report_hub::MemoryStore;

fn offline_settings() -> Settings {
    Settings {
        app_name: "stock-report-hub".into(),
        env: "test".into(),
        bind_addr: "127.0.0.1:0".into(),
        user_agent: "stock-report-hub-test".into(),
        rate_limit_requests_per_min: 60_000,
        request_timeout: Duration::from_secs(5),
        html_source_urls: Vec::new(),
        pdf_source_urls: Vec::new(),
        pdf_dir: std::env::temp_dir().join("stock-report-hub-api-test"),
        openai_api_key: None,
        openai_model: "gpt-4o-mini".into(),
        summarize_workers: 2,
        run_deadline: Some(Duration::from_secs(30)),
    }
}

/// Serves the API on an ephemeral port; the store handle lets tests seed
/// rows directly.
async fn spawn_app() -> (String, Arc<dyn ContentStore>) {
    let settings = Arc::new(offline_settings());
    let store: Arc<dyn ContentStore> = Arc::new(MemoryStore::new());
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        Arc::clone(&store),
        Arc::new(RateLimitedFetcher::from_settings(&settings).unwrap()),
        Arc::new(SummaryEngine::offline()),
        &settings,
    ));
    let router = api::create_router(AppState {
        settings,
        store: Arc::clone(&store),
        orchestrator,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}"), store)
}

#[tokio::test]
async fn health_reports_ok() {
    let (base, _store) = spawn_app().await;
    let body: Json = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["env"], json!("test"));
}

#[tokio::test]
async fn ticker_create_is_unique_by_symbol() {
    let (base, _store) = spawn_app().await;
    let client = reqwest::Client::new();

    let created = client
        .post(format!("{base}/api/tickers"))
        .json(&json!({"symbol": "000270", "name": "기아"}))
        .send()
        .await
        .unwrap();
    assert!(created.status().is_success());

    let dup = client
        .post(format!("{base}/api/tickers"))
        .json(&json!({"symbol": "000270", "name": "기아"}))
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status(), reqwest::StatusCode::CONFLICT);

    let listed: Json = client
        .get(format!("{base}/api/tickers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let symbols: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["symbol"].as_str().unwrap())
        .collect();
    assert_eq!(symbols, vec!["000270"]);
}

#[tokio::test]
async fn source_create_is_unique_by_url() {
    let (base, _store) = spawn_app().await;
    let client = reqwest::Client::new();
    let payload = json!({
        "name": "Research Page",
        "kind": "html",
        "url": "https://r.example/daily"
    });

    let created = client
        .post(format!("{base}/api/sources"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert!(created.status().is_success());

    let dup = client
        .post(format!("{base}/api/sources"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status(), reqwest::StatusCode::CONFLICT);
}

#[tokio::test]
async fn reports_window_defaults_to_seven_days() {
    let (base, store) = spawn_app().await;
    let client = reqwest::Client::new();

    let source = store
        .upsert_source("Research Page", SourceKind::Html, "https://r.example/daily")
        .await
        .unwrap();
    for (days_ago, title, text) in [
        (30i64, "지난달 리포트", "옛 본문"),
        (2, "이번주 리포트", "새 본문"),
    ] {
        store
            .insert_report_if_new(NewReport {
                source_id: source.id,
                title: title.into(),
                published_at: Utc::now() - chrono::Duration::days(days_ago),
                raw_text: text.into(),
                raw_hash: content_hash(text),
            })
            .await
            .unwrap()
            .unwrap();
    }

    // Default window: last 7 days only.
    let recent: Json = client
        .get(format!("{base}/api/reports"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let recent = recent.as_array().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["title"], json!("이번주 리포트"));
    assert_eq!(recent[0]["source_id"], json!(source.id));
    assert!(recent[0]["published_at"].is_string());
    assert!(
        recent[0].get("raw_text").is_none(),
        "raw text stays out of the listing"
    );

    // Wider window sees both, newest first.
    let wide: Json = client
        .get(format!("{base}/api/reports?days=60"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let titles: Vec<&str> = wide
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["이번주 리포트", "지난달 리포트"]);
}

#[tokio::test]
async fn summary_is_404_before_a_run_and_200_after() {
    let (base, _store) = spawn_app().await;
    let client = reqwest::Client::new();
    let today = Utc::now().date_naive();

    let missing = client
        .get(format!("{base}/api/tickers/005930/summary"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    // No sources configured: the run bootstraps tickers and writes sentinel
    // digests only.
    let run: Json = client
        .post(format!("{base}/api/tickers/run-daily"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(run["fetched_reports"], json!(0));
    assert_eq!(run["mentions_created"], json!(0));
    assert_eq!(run["sources_failed"], json!(0));
    assert_eq!(run["summaries_created"], json!(5));
    assert_eq!(run["asof_date"], json!(today.to_string()));

    let found: Json = client
        .get(format!(
            "{base}/api/tickers/005930/summary?asof_date={today}"
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(found["symbol"], json!("005930"));
    assert_eq!(found["confidence"], json!(0));
    assert_eq!(found["summary"], json!("언급 없음"));
}
