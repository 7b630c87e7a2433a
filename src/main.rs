//! stock-report-hub — Binary Entrypoint
//! Boots the Axum HTTP server around the in-process store and the daily
//! ingestion pipeline. The pipeline runs on demand via
//! `POST /api/tickers/run-daily`; an external scheduler supplies the cadence.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stock_report_hub::api::{self, AppState};
use stock_report_hub::config::Settings;
use stock_report_hub::fetch::RateLimitedFetcher;
use stock_report_hub::metrics::Metrics;
use stock_report_hub::pipeline::PipelineOrchestrator;
use stock_report_hub::store::memory::MemoryStore;
use stock_report_hub::store::ContentStore;
use stock_report_hub::summarize::SummaryEngine;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stock_report_hub=info,pipeline=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Arc::new(Settings::from_env());
    tracing::info!(
        app = %settings.app_name,
        env = %settings.env,
        html_sources = settings.html_source_urls.len(),
        pdf_sources = settings.pdf_source_urls.len(),
        llm = settings.openai_api_key.is_some(),
        "starting"
    );

    let metrics = Metrics::init();

    let store: Arc<dyn ContentStore> = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(RateLimitedFetcher::from_settings(&settings)?);
    let engine = Arc::new(SummaryEngine::from_settings(&settings)?);
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        Arc::clone(&store),
        fetcher,
        engine,
        &settings,
    ));

    let state = AppState {
        settings: Arc::clone(&settings),
        store,
        orchestrator,
    };
    let router = api::create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("binding {}", settings.bind_addr))?;
    tracing::info!(addr = %settings.bind_addr, "listening");
    axum::serve(listener, router).await.context("serving http")?;
    Ok(())
}
