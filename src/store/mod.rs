// src/store/mod.rs
//! Persistence boundary for the pipeline.
//!
//! The pipeline never owns storage; it issues read/upsert/insert calls
//! against [`ContentStore`] and relies on the store's unique keys for all
//! cross-run and cross-writer consistency. [`memory::MemoryStore`] is the
//! in-process reference implementation.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Html,
    Pdf,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Html => f.write_str("html"),
            SourceKind::Pdf => f.write_str("pdf"),
        }
    }
}

/// A fetch origin. `url` is the natural key; rows are immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub kind: SourceKind,
    pub url: String,
}

/// One fetched document. Unique on (source_id, raw_hash), with
/// (source_id, published_at) as a coarser guard. Never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub raw_text: String,
    pub raw_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ticker {
    pub id: i64,
    pub symbol: String,
    pub name: String,
}

/// Deduplicated snippet evidence for one (report, ticker) pair.
/// Snippets are stored newline-joined; the extractor guarantees no snippet
/// carries an embedded newline.
#[derive(Debug, Clone, Serialize)]
pub struct Mention {
    pub id: i64,
    pub report_id: i64,
    pub ticker_id: i64,
    pub snippets: String,
}

impl Mention {
    /// Stored snippet lines, trimmed, empties dropped.
    pub fn snippet_lines(&self) -> Vec<String> {
        self.snippets
            .split('\n')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// One digest per (symbol, asof_date). Bullets are a list-of-strings value
/// here; how a store encodes them is that adapter's concern.
#[derive(Debug, Clone, Serialize)]
pub struct TickerSummary {
    pub id: i64,
    pub symbol: String,
    pub asof_date: NaiveDate,
    pub summary: String,
    pub bullets: Vec<String>,
    pub confidence: i32,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub source_id: i64,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub raw_text: String,
    pub raw_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewSummary {
    pub symbol: String,
    pub asof_date: NaiveDate,
    pub summary: String,
    pub bullets: Vec<String>,
    pub confidence: i32,
}

/// Outcome of a mention write; `created` distinguishes a first insert from a
/// snippet-set update and is what the pipeline's counter is built from.
#[derive(Debug, Clone)]
pub struct MentionUpsert {
    pub mention: Mention,
    pub created: bool,
}

/// SHA-256 hex digest of report text; the content-dedup key.
pub fn content_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Idempotent by url: an existing row is returned unchanged.
    async fn upsert_source(&self, name: &str, kind: SourceKind, url: &str) -> Result<Source>;
    /// Strict insert: `None` when the url is already taken. The unique key
    /// is checked and the row written under one store-side critical section,
    /// so callers need no lookup of their own.
    async fn create_source(&self, name: &str, kind: SourceKind, url: &str)
        -> Result<Option<Source>>;
    async fn list_sources(&self) -> Result<Vec<Source>>;

    /// Returns `None` when a report with the same (source, hash) — or the
    /// coarser (source, published_at) — already exists. Not an error.
    async fn insert_report_if_new(&self, report: NewReport) -> Result<Option<Report>>;
    /// Reports published at or after `cutoff`, newest first, capped.
    async fn list_reports_since(&self, cutoff: DateTime<Utc>, limit: usize) -> Result<Vec<Report>>;

    /// Idempotent by symbol.
    async fn upsert_ticker(&self, symbol: &str, name: &str) -> Result<Ticker>;
    /// Strict insert: `None` when the symbol is already taken.
    async fn create_ticker(&self, symbol: &str, name: &str) -> Result<Option<Ticker>>;
    async fn list_tickers(&self) -> Result<Vec<Ticker>>;

    async fn find_mention(&self, report_id: i64, ticker_id: i64) -> Result<Option<Mention>>;
    /// Write the (already merged) snippet set for a pair. A row racing into
    /// existence between the caller's lookup and this write is treated as
    /// "already exists": the write lands as an update, never a failure.
    async fn create_or_update_mention(
        &self,
        report_id: i64,
        ticker_id: i64,
        snippets: &[String],
    ) -> Result<MentionUpsert>;
    /// Mentions of a ticker ordered by owning report publish time, newest
    /// first, capped.
    async fn recent_mentions(&self, ticker_id: i64, limit: usize) -> Result<Vec<Mention>>;

    async fn summary_exists(&self, symbol: &str, asof_date: NaiveDate) -> Result<bool>;
    /// Returns false (no-op) when a row for (symbol, asof_date) already
    /// exists, true when this call created it.
    async fn insert_summary(&self, summary: NewSummary) -> Result<bool>;
    async fn find_summary(&self, symbol: &str, asof_date: NaiveDate)
        -> Result<Option<TickerSummary>>;
}
