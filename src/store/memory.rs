// src/store/memory.rs
//! In-memory reference store.
//!
//! A single mutex guards all tables, so every trait method is atomic with
//! respect to its unique-key check. Bullets are kept JSON-encoded internally
//! to match how a SQL adapter would persist them; decoding happens on read.

use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{
    ContentStore, Mention, MentionUpsert, NewReport, NewSummary, Report, Source, SourceKind,
    Ticker, TickerSummary,
};

#[derive(Debug, Clone)]
struct SummaryRow {
    id: i64,
    symbol: String,
    asof_date: NaiveDate,
    summary: String,
    bullets_json: String,
    confidence: i32,
}

#[derive(Debug, Default)]
struct Inner {
    sources: Vec<Source>,
    reports: Vec<Report>,
    tickers: Vec<Ticker>,
    mentions: Vec<Mention>,
    summaries: Vec<SummaryRow>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn upsert_source(&self, name: &str, kind: SourceKind, url: &str) -> Result<Source> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(existing) = inner.sources.iter().find(|s| s.url == url) {
            return Ok(existing.clone());
        }
        let source = Source {
            id: inner.next_id(),
            name: name.to_string(),
            kind,
            url: url.to_string(),
        };
        inner.sources.push(source.clone());
        Ok(source)
    }

    async fn create_source(
        &self,
        name: &str,
        kind: SourceKind,
        url: &str,
    ) -> Result<Option<Source>> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if inner.sources.iter().any(|s| s.url == url) {
            return Ok(None);
        }
        let source = Source {
            id: inner.next_id(),
            name: name.to_string(),
            kind,
            url: url.to_string(),
        };
        inner.sources.push(source.clone());
        Ok(Some(source))
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut out = inner.sources.clone();
        out.sort_by_key(|s| std::cmp::Reverse(s.id));
        Ok(out)
    }

    async fn insert_report_if_new(&self, report: NewReport) -> Result<Option<Report>> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let duplicate = inner.reports.iter().any(|r| {
            r.source_id == report.source_id
                && (r.raw_hash == report.raw_hash || r.published_at == report.published_at)
        });
        if duplicate {
            return Ok(None);
        }
        let row = Report {
            id: inner.next_id(),
            source_id: report.source_id,
            title: report.title,
            published_at: report.published_at,
            raw_text: report.raw_text,
            raw_hash: report.raw_hash,
        };
        inner.reports.push(row.clone());
        Ok(Some(row))
    }

    async fn list_reports_since(&self, cutoff: DateTime<Utc>, limit: usize) -> Result<Vec<Report>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut out: Vec<Report> = inner
            .reports
            .iter()
            .filter(|r| r.published_at >= cutoff)
            .cloned()
            .collect();
        out.sort_by_key(|r| std::cmp::Reverse(r.published_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn upsert_ticker(&self, symbol: &str, name: &str) -> Result<Ticker> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if let Some(existing) = inner.tickers.iter().find(|t| t.symbol == symbol) {
            return Ok(existing.clone());
        }
        let ticker = Ticker {
            id: inner.next_id(),
            symbol: symbol.to_string(),
            name: name.to_string(),
        };
        inner.tickers.push(ticker.clone());
        Ok(ticker)
    }

    async fn create_ticker(&self, symbol: &str, name: &str) -> Result<Option<Ticker>> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        if inner.tickers.iter().any(|t| t.symbol == symbol) {
            return Ok(None);
        }
        let ticker = Ticker {
            id: inner.next_id(),
            symbol: symbol.to_string(),
            name: name.to_string(),
        };
        inner.tickers.push(ticker.clone());
        Ok(Some(ticker))
    }

    async fn list_tickers(&self) -> Result<Vec<Ticker>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut out = inner.tickers.clone();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn find_mention(&self, report_id: i64, ticker_id: i64) -> Result<Option<Mention>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .mentions
            .iter()
            .find(|m| m.report_id == report_id && m.ticker_id == ticker_id)
            .cloned())
    }

    async fn create_or_update_mention(
        &self,
        report_id: i64,
        ticker_id: i64,
        snippets: &[String],
    ) -> Result<MentionUpsert> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let joined = snippets.join("\n");
        if let Some(existing) = inner
            .mentions
            .iter_mut()
            .find(|m| m.report_id == report_id && m.ticker_id == ticker_id)
        {
            existing.snippets = joined;
            let mention = existing.clone();
            return Ok(MentionUpsert {
                mention,
                created: false,
            });
        }
        let mention = Mention {
            id: inner.next_id(),
            report_id,
            ticker_id,
            snippets: joined,
        };
        inner.mentions.push(mention.clone());
        Ok(MentionUpsert {
            mention,
            created: true,
        })
    }

    async fn recent_mentions(&self, ticker_id: i64, limit: usize) -> Result<Vec<Mention>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let mut rows: Vec<(DateTime<Utc>, Mention)> = inner
            .mentions
            .iter()
            .filter(|m| m.ticker_id == ticker_id)
            .map(|m| {
                let published = inner
                    .reports
                    .iter()
                    .find(|r| r.id == m.report_id)
                    .map(|r| r.published_at)
                    .unwrap_or_default();
                (published, m.clone())
            })
            .collect();
        rows.sort_by_key(|(published, _)| std::cmp::Reverse(*published));
        rows.truncate(limit);
        Ok(rows.into_iter().map(|(_, m)| m).collect())
    }

    async fn summary_exists(&self, symbol: &str, asof_date: NaiveDate) -> Result<bool> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner
            .summaries
            .iter()
            .any(|s| s.symbol == symbol && s.asof_date == asof_date))
    }

    async fn insert_summary(&self, summary: NewSummary) -> Result<bool> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let exists = inner
            .summaries
            .iter()
            .any(|s| s.symbol == summary.symbol && s.asof_date == summary.asof_date);
        if exists {
            // Racing duplicate creation converts to "already exists".
            return Ok(false);
        }
        let bullets_json =
            serde_json::to_string(&summary.bullets).context("encoding summary bullets")?;
        let row = SummaryRow {
            id: inner.next_id(),
            symbol: summary.symbol,
            asof_date: summary.asof_date,
            summary: summary.summary,
            bullets_json,
            confidence: summary.confidence,
        };
        inner.summaries.push(row);
        Ok(true)
    }

    async fn find_summary(
        &self,
        symbol: &str,
        asof_date: NaiveDate,
    ) -> Result<Option<TickerSummary>> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let Some(row) = inner
            .summaries
            .iter()
            .find(|s| s.symbol == symbol && s.asof_date == asof_date)
        else {
            return Ok(None);
        };
        let bullets: Vec<String> =
            serde_json::from_str(&row.bullets_json).context("decoding summary bullets")?;
        Ok(Some(TickerSummary {
            id: row.id,
            symbol: row.symbol.clone(),
            asof_date: row.asof_date,
            summary: row.summary.clone(),
            bullets,
            confidence: row.confidence,
        }))
    }
}
