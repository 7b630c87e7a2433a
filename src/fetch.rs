// src/fetch.rs
//! Rate-limited, retrying HTTP fetcher for report sources.
//!
//! One fetcher value owns the reqwest client and the shared rate budget; it is
//! constructed once at startup and passed to the pipeline. Parallel callers
//! all pass through the same admission lock, so the requests-per-minute budget
//! holds across sources.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use rand::Rng;
use tokio::sync::Mutex;

use crate::config::Settings;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub requests_per_minute: u32,
    pub timeout: Duration,
    pub user_agent: String,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 30,
            timeout: Duration::from_secs(20),
            user_agent: "Mozilla/5.0".to_string(),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(10),
        }
    }
}

pub struct RateLimitedFetcher {
    client: reqwest::Client,
    cfg: FetchConfig,
    // Serializes the pre-request delay so the budget is a single shared resource.
    admission: Mutex<()>,
}

impl RateLimitedFetcher {
    pub fn new(cfg: FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.timeout)
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            client,
            cfg,
            admission: Mutex::new(()),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(FetchConfig {
            requests_per_minute: settings.rate_limit_requests_per_min,
            timeout: settings.request_timeout,
            user_agent: settings.user_agent.clone(),
            ..FetchConfig::default()
        })
    }

    /// GET `url`, waiting out the rate budget first and retrying transient
    /// failures (network error, timeout, non-2xx) with exponential backoff.
    /// After the attempt budget is spent the last error propagates; the caller
    /// decides what a single URL's failure means for the rest of the run.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut backoff = self.cfg.backoff_base;
        let mut last_err = None;

        for attempt in 1..=self.cfg.max_attempts.max(1) {
            self.admit().await;
            match self.try_get(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::warn!(error = ?e, url, attempt, "fetch attempt failed");
                    last_err = Some(e);
                    if attempt < self.cfg.max_attempts {
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(self.cfg.backoff_cap);
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no fetch attempts made")))
            .with_context(|| format!("fetching {url}"))
    }

    async fn try_get(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("HTTP {status} for {url}");
        }
        let body = resp.bytes().await.context("reading response body")?;
        Ok(body.to_vec())
    }

    /// Soft rate limit: `60 / rpm` seconds plus up to 20% jitter, held under
    /// the admission lock so concurrent fetches queue instead of bursting.
    async fn admit(&self) {
        let _gate = self.admission.lock().await;
        let per_min = self.cfg.requests_per_minute.max(1);
        let delay = 60.0 / f64::from(per_min);
        let jitter = rand::rng().random_range(0.0..delay * 0.2);
        tokio::time::sleep(Duration::from_secs_f64(delay + jitter)).await;
    }
}
