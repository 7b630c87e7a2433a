// src/api.rs
//! HTTP surface: read endpoints over the persisted entities plus the manual
//! pipeline trigger. The pipeline itself never depends on this module.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::config::Settings;
use crate::pipeline::{PipelineOrchestrator, RunReport};
use crate::store::{ContentStore, Source, SourceKind, Ticker, TickerSummary};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn ContentStore>,
    pub orchestrator: Arc<PipelineOrchestrator>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sources", get(list_sources).post(create_source))
        .route("/api/reports", get(list_reports))
        .route("/api/tickers", get(list_tickers).post(create_ticker))
        .route("/api/tickers/{symbol}/summary", get(get_summary))
        .route("/api/tickers/run-daily", post(run_daily))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    tracing::error!(error = ?e, "api handler failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
}

#[derive(Serialize)]
struct HealthOut {
    ok: bool,
    env: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthOut> {
    Json(HealthOut {
        ok: true,
        env: state.settings.env.clone(),
    })
}

async fn list_sources(State(state): State<AppState>) -> ApiResult<Vec<Source>> {
    state.store.list_sources().await.map(Json).map_err(internal)
}

#[derive(Deserialize)]
struct CreateSourceIn {
    name: String,
    kind: SourceKind,
    url: String,
}

async fn create_source(
    State(state): State<AppState>,
    Json(body): Json<CreateSourceIn>,
) -> ApiResult<Source> {
    // The store's unique key decides the conflict; no lookup here, so two
    // racing POSTs cannot both see "absent".
    match state
        .store
        .create_source(&body.name, body.kind, &body.url)
        .await
        .map_err(internal)?
    {
        Some(source) => Ok(Json(source)),
        None => Err((StatusCode::CONFLICT, "Source already exists".into())),
    }
}

#[derive(Deserialize)]
struct ReportsQuery {
    days: Option<i64>,
}

#[derive(Serialize)]
struct ReportOut {
    id: i64,
    title: String,
    published_at: DateTime<Utc>,
    source_id: i64,
}

async fn list_reports(
    State(state): State<AppState>,
    Query(q): Query<ReportsQuery>,
) -> ApiResult<Vec<ReportOut>> {
    let days = q.days.unwrap_or(7).max(0);
    let cutoff = Utc::now() - chrono::Duration::days(days);
    let rows = state
        .store
        .list_reports_since(cutoff, 200)
        .await
        .map_err(internal)?;
    Ok(Json(
        rows.into_iter()
            .map(|r| ReportOut {
                id: r.id,
                title: r.title,
                published_at: r.published_at,
                source_id: r.source_id,
            })
            .collect(),
    ))
}

async fn list_tickers(State(state): State<AppState>) -> ApiResult<Vec<Ticker>> {
    state.store.list_tickers().await.map(Json).map_err(internal)
}

#[derive(Deserialize)]
struct CreateTickerIn {
    symbol: String,
    name: String,
}

async fn create_ticker(
    State(state): State<AppState>,
    Json(body): Json<CreateTickerIn>,
) -> ApiResult<Ticker> {
    match state
        .store
        .create_ticker(&body.symbol, &body.name)
        .await
        .map_err(internal)?
    {
        Some(ticker) => Ok(Json(ticker)),
        None => Err((StatusCode::CONFLICT, "Ticker already exists".into())),
    }
}

#[derive(Deserialize)]
struct SummaryQuery {
    asof_date: Option<NaiveDate>,
}

async fn get_summary(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(q): Query<SummaryQuery>,
) -> ApiResult<TickerSummary> {
    let asof_date = q.asof_date.unwrap_or_else(|| Utc::now().date_naive());
    match state
        .store
        .find_summary(&symbol, asof_date)
        .await
        .map_err(internal)?
    {
        Some(row) => Ok(Json(row)),
        None => Err((StatusCode::NOT_FOUND, "Summary not found".into())),
    }
}

async fn run_daily(State(state): State<AppState>) -> ApiResult<RunReport> {
    state
        .orchestrator
        .run_today(state.settings.run_deadline)
        .await
        .map(Json)
        .map_err(internal)
}
