// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod mentions;
pub mod metrics;
pub mod pipeline;
pub mod store;
pub mod summarize;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::Settings;
pub use crate::fetch::{FetchConfig, RateLimitedFetcher};
pub use crate::pipeline::{PipelineOrchestrator, RunReport};
pub use crate::store::{memory::MemoryStore, ContentStore};
pub use crate::summarize::{CompletionProvider, Digest, SummaryEngine};
