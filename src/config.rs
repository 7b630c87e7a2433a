// src/config.rs
//! Runtime settings, read once from the environment at startup.
//!
//! `.env` loading happens in `main` via dotenvy before this is called, so a
//! local dev file can supply source URLs and the OpenAI key without exports.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_name: String,
    pub env: String,
    pub bind_addr: String,

    pub user_agent: String,
    pub rate_limit_requests_per_min: u32,
    pub request_timeout: Duration,

    /// HTML research-page origins, one Report attempt per URL per run.
    pub html_source_urls: Vec<String>,
    /// Direct PDF links; raw bytes are saved under `pdf_dir` before parsing.
    pub pdf_source_urls: Vec<String>,
    pub pdf_dir: PathBuf,

    /// Absent key selects the deterministic mock digest path.
    pub openai_api_key: Option<String>,
    pub openai_model: String,

    /// Concurrent per-ticker summarization calls.
    pub summarize_workers: usize,
    /// Optional hard deadline for a whole pipeline run.
    pub run_deadline: Option<Duration>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "stock-report-hub"),
            env: env_or("APP_ENV", "dev"),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8000"),

            user_agent: env_or("USER_AGENT", "Mozilla/5.0"),
            rate_limit_requests_per_min: env_parse("RATE_LIMIT_REQUESTS_PER_MIN", 30),
            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT_SECONDS", 20u64)),

            html_source_urls: split_csv(&env_or("HTML_SOURCE_URLS", "")),
            pdf_source_urls: split_csv(&env_or("PDF_SOURCE_URLS", "")),
            pdf_dir: PathBuf::from(env_or("PDF_DIR", "data/pdf")),

            openai_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            openai_model: env_or("OPENAI_MODEL", "gpt-4o-mini"),

            summarize_workers: env_parse("SUMMARIZE_WORKERS", 4usize).max(1),
            run_deadline: std::env::var("RUN_DEADLINE_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Comma-separated list, trimmed, empties dropped.
pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
        .map(|x| x.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_drops_empties() {
        let v = split_csv(" https://a.example/r1 ,, https://b.example/r2,");
        assert_eq!(
            v,
            vec![
                "https://a.example/r1".to_string(),
                "https://b.example/r2".to_string()
            ]
        );
        assert!(split_csv("").is_empty());
        assert!(split_csv(" , ,").is_empty());
    }

    #[serial_test::serial]
    #[test]
    fn from_env_applies_defaults_and_overrides() {
        std::env::remove_var("RATE_LIMIT_REQUESTS_PER_MIN");
        std::env::remove_var("OPENAI_API_KEY");
        let s = Settings::from_env();
        assert_eq!(s.rate_limit_requests_per_min, 30);
        assert_eq!(s.request_timeout, Duration::from_secs(20));
        assert!(s.openai_api_key.is_none());

        std::env::set_var("RATE_LIMIT_REQUESTS_PER_MIN", "120");
        std::env::set_var("OPENAI_API_KEY", "  ");
        let s2 = Settings::from_env();
        assert_eq!(s2.rate_limit_requests_per_min, 120);
        // Blank key still selects the mock path.
        assert!(s2.openai_api_key.is_none());

        std::env::remove_var("RATE_LIMIT_REQUESTS_PER_MIN");
        std::env::remove_var("OPENAI_API_KEY");
    }
}
