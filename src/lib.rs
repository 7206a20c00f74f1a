// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod ai;
pub mod analyze;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod news;
pub mod pipeline;
pub mod store;
pub mod summarize;

// ---- Re-exports for stable public API ----
pub use crate::config::RunConfig;
pub use crate::error::{
    AggregationError, CollectionError, ConfigError, PersistenceError, PipelineError, ProviderError,
};
pub use crate::ingest::types::{FeedSource, Language, RawArticle};
pub use crate::news::{DailySummary, EnrichedArticle};
pub use crate::pipeline::{Pipeline, RunOutcome, RunReport};
