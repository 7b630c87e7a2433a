// src/pipeline.rs
//! The daily ingestion-and-summarization run.
//!
//! One run covers a single as-of calendar date and is safe to repeat: report
//! inserts dedup by content hash, mention writes grow a unique (report,
//! ticker) row, and summarization skips tickers that already have a row for
//! the date. A single source failing to fetch is recorded and skipped; the
//! run keeps going.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::Settings;
use crate::extract;
use crate::fetch::RateLimitedFetcher;
use crate::mentions::{extract_mentions, merge_snippets};
use crate::store::{content_hash, ContentStore, NewReport, NewSummary, Report, SourceKind};
use crate::summarize::SummaryEngine;

/// Baseline tracked instruments, upserted at the start of every run so a
/// fresh deployment produces digests without any API calls first.
const DEFAULT_TICKERS: &[(&str, &str)] = &[
    ("005930", "삼성전자"),
    ("000660", "SK하이닉스"),
    ("005380", "현대차"),
    ("035420", "NAVER"),
    ("035720", "카카오"),
];

/// Snippet lines handed to the summary engine, most recent first.
const MAX_SUMMARY_SNIPPETS: usize = 40;
/// Mention rows consulted per ticker when gathering those lines.
const RECENT_MENTION_LIMIT: usize = 50;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Completed pipeline runs.");
        describe_counter!(
            "pipeline_reports_created_total",
            "Reports stored after content-hash dedup."
        );
        describe_counter!(
            "pipeline_source_errors_total",
            "Sources skipped this run after exhausting fetch retries."
        );
        describe_counter!(
            "pipeline_mentions_created_total",
            "New (report, ticker) mention rows."
        );
        describe_counter!(
            "pipeline_summaries_created_total",
            "New (symbol, asof_date) summary rows."
        );
        describe_counter!(
            "pipeline_summarize_errors_total",
            "Per-ticker summarization failures (ticker stays eligible)."
        );
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts when the pipeline last completed a run."
        );
    });
}

/// Counters returned by one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub fetched_reports: usize,
    pub mentions_created: usize,
    pub summaries_created: usize,
    pub sources_failed: usize,
    pub asof_date: NaiveDate,
}

pub struct PipelineOrchestrator {
    store: Arc<dyn ContentStore>,
    fetcher: Arc<RateLimitedFetcher>,
    engine: Arc<SummaryEngine>,
    html_source_urls: Vec<String>,
    pdf_source_urls: Vec<String>,
    pdf_dir: std::path::PathBuf,
    summarize_workers: usize,
}

impl PipelineOrchestrator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        fetcher: Arc<RateLimitedFetcher>,
        engine: Arc<SummaryEngine>,
        settings: &Settings,
    ) -> Self {
        Self {
            store,
            fetcher,
            engine,
            html_source_urls: settings.html_source_urls.clone(),
            pdf_source_urls: settings.pdf_source_urls.clone(),
            pdf_dir: settings.pdf_dir.clone(),
            summarize_workers: settings.summarize_workers,
        }
    }

    /// Run for today's calendar date, optionally under a hard deadline.
    /// Hitting the deadline abandons in-flight work; everything committed so
    /// far stays valid and the next run picks up from the store.
    pub async fn run_today(&self, deadline: Option<Duration>) -> Result<RunReport> {
        let asof_date = Utc::now().date_naive();
        match deadline {
            Some(limit) => tokio::time::timeout(limit, self.run_for(asof_date))
                .await
                .context("pipeline run hit its deadline")?,
            None => self.run_for(asof_date).await,
        }
    }

    pub async fn run_for(&self, asof_date: NaiveDate) -> Result<RunReport> {
        ensure_metrics_described();

        self.ensure_baseline_tickers().await?;
        let (new_reports, sources_failed) = self.fetch_reports().await?;
        let mentions_created = self.create_mentions(&new_reports).await?;
        let summaries_created = self.create_summaries(asof_date).await?;

        counter!("pipeline_runs_total").increment(1);
        counter!("pipeline_reports_created_total").increment(new_reports.len() as u64);
        counter!("pipeline_mentions_created_total").increment(mentions_created as u64);
        counter!("pipeline_summaries_created_total").increment(summaries_created as u64);
        gauge!("pipeline_last_run_ts").set(Utc::now().timestamp().max(0) as f64);

        let report = RunReport {
            fetched_reports: new_reports.len(),
            mentions_created,
            summaries_created,
            sources_failed,
            asof_date,
        };
        tracing::info!(
            target: "pipeline",
            fetched = report.fetched_reports,
            mentions = report.mentions_created,
            summaries = report.summaries_created,
            failed_sources = report.sources_failed,
            asof = %report.asof_date,
            "daily run finished"
        );
        Ok(report)
    }

    async fn ensure_baseline_tickers(&self) -> Result<()> {
        for (symbol, name) in DEFAULT_TICKERS {
            self.store.upsert_ticker(symbol, name).await?;
        }
        Ok(())
    }

    /// Fetch every configured source and store the documents whose content
    /// hash is new. A source that exhausts its retries is counted and
    /// skipped; the rest of the run proceeds.
    async fn fetch_reports(&self) -> Result<(Vec<Report>, usize)> {
        let now = Utc::now();
        let mut reports = Vec::new();
        let mut failed = 0usize;

        for url in &self.html_source_urls {
            let source = self
                .store
                .upsert_source("Research Page", SourceKind::Html, url)
                .await?;
            let bytes = match self.fetcher.fetch(url).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = ?e, url, "source skipped this run");
                    counter!("pipeline_source_errors_total").increment(1);
                    failed += 1;
                    continue;
                }
            };
            let html = String::from_utf8_lossy(&bytes);
            let (text, title) = extract::html_to_text(&html);
            let title = if title.is_empty() {
                source.name.clone()
            } else {
                title
            };
            let stored = self
                .store
                .insert_report_if_new(NewReport {
                    source_id: source.id,
                    title,
                    published_at: now,
                    raw_hash: content_hash(&text),
                    raw_text: text,
                })
                .await?;
            if let Some(report) = stored {
                reports.push(report);
            }
        }

        for (i, url) in self.pdf_source_urls.iter().enumerate() {
            let source = self
                .store
                .upsert_source("PDF Source", SourceKind::Pdf, url)
                .await?;
            let bytes = match self.fetcher.fetch(url).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(error = ?e, url, "source skipped this run");
                    counter!("pipeline_source_errors_total").increment(1);
                    failed += 1;
                    continue;
                }
            };

            // Raw bytes land on disk before parsing so a bad parse can be
            // reproduced from the exact document.
            std::fs::create_dir_all(&self.pdf_dir)
                .with_context(|| format!("creating {}", self.pdf_dir.display()))?;
            let path = self.pdf_dir.join(format!("report_{i}.pdf"));
            std::fs::write(&path, &bytes)
                .with_context(|| format!("writing {}", path.display()))?;

            let text = extract::pdf_to_text(&bytes);
            let stored = self
                .store
                .insert_report_if_new(NewReport {
                    source_id: source.id,
                    title: source.name.clone(),
                    published_at: now,
                    raw_hash: content_hash(&text),
                    raw_text: text,
                })
                .await?;
            if let Some(report) = stored {
                reports.push(report);
            }
        }

        Ok((reports, failed))
    }

    /// Scan every new report against every ticker, merging snippets into the
    /// per-(report, ticker) mention rows. Returns how many rows were created.
    async fn create_mentions(&self, new_reports: &[Report]) -> Result<usize> {
        let tickers = self.store.list_tickers().await?;
        let mut created = 0usize;

        for report in new_reports {
            for ticker in &tickers {
                let snippets = extract_mentions(&report.raw_text, &ticker.symbol, &ticker.name);
                if snippets.is_empty() {
                    continue;
                }
                let merged = match self.store.find_mention(report.id, ticker.id).await? {
                    Some(existing) => merge_snippets(&existing.snippet_lines(), &snippets),
                    None => snippets,
                };
                let outcome = self
                    .store
                    .create_or_update_mention(report.id, ticker.id, &merged)
                    .await?;
                if outcome.created {
                    created += 1;
                }
            }
        }
        Ok(created)
    }

    /// Summarize each ticker that has no digest for `asof_date` yet, with a
    /// bounded worker pool. A ticker whose call fails is logged and skipped;
    /// no row is written, so it stays eligible on the next run.
    async fn create_summaries(&self, asof_date: NaiveDate) -> Result<usize> {
        let tickers = self.store.list_tickers().await?;
        let permits = Arc::new(Semaphore::new(self.summarize_workers));
        let mut tasks: JoinSet<Result<bool>> = JoinSet::new();

        for ticker in tickers {
            if self.store.summary_exists(&ticker.symbol, asof_date).await? {
                continue;
            }
            let store = Arc::clone(&self.store);
            let engine = Arc::clone(&self.engine);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.context("worker pool closed")?;

                let mut snippets = Vec::new();
                for mention in store.recent_mentions(ticker.id, RECENT_MENTION_LIMIT).await? {
                    snippets.extend(mention.snippet_lines());
                }
                snippets.truncate(MAX_SUMMARY_SNIPPETS);

                let digest = match engine.summarize(&snippets).await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!(
                            error = ?e,
                            symbol = %ticker.symbol,
                            "summarization failed, ticker stays eligible next run"
                        );
                        counter!("pipeline_summarize_errors_total").increment(1);
                        return Ok(false);
                    }
                };
                store
                    .insert_summary(NewSummary {
                        symbol: ticker.symbol.clone(),
                        asof_date,
                        summary: digest.summary,
                        bullets: digest.bullets,
                        confidence: digest.confidence,
                    })
                    .await
            });
        }

        let mut created = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(true)) => created += 1,
                Ok(Ok(false)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(error = ?e, "summary task failed");
                }
                Err(e) => {
                    tracing::warn!(error = ?e, "summary task panicked or was cancelled");
                }
            }
        }
        Ok(created)
    }
}
