// src/error.rs
//! Error taxonomy for a pipeline run.
//!
//! Only [`ConfigError`] and [`PersistenceError`] halt a run. Collection and
//! provider failures are recovered where they happen and end up as strings in
//! `ProcessingMetrics::errors`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::ingest::types::Language;

/// Why a single feed produced no articles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {0}")]
    Http(u16),
    #[error("malformed feed: {0}")]
    Parse(String),
    #[error("no entries found")]
    Empty,
}

impl FetchFailure {
    /// Timeouts, connection problems, 429 and 5xx are worth another fetch.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchFailure::Timeout | FetchFailure::Network(_) => true,
            FetchFailure::Http(status) => *status == 429 || *status >= 500,
            FetchFailure::Parse(_) | FetchFailure::Empty => false,
        }
    }
}

/// Per-source collection failure. Always recovered by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("feed collection failed for {source_name}: {reason}")]
pub struct CollectionError {
    pub source_name: String,
    pub reason: FetchFailure,
}

impl CollectionError {
    pub fn new(source_name: impl Into<String>, reason: FetchFailure) -> Self {
        Self {
            source_name: source_name.into(),
            reason,
        }
    }
}

/// Coarse class of a provider failure; drives the retry/fallback decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RateLimited,
    Transient,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("{provider}: rate limited")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },
    #[error("{provider}: transient failure: {message}")]
    Transient { provider: String, message: String },
    #[error("{provider}: fatal error: {message}")]
    Fatal { provider: String, message: String },
}

impl ProviderError {
    pub fn rate_limited(provider: impl Into<String>, retry_after: Option<Duration>) -> Self {
        ProviderError::RateLimited {
            provider: provider.into(),
            retry_after,
        }
    }

    pub fn transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Transient {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn fatal(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Fatal {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::RateLimited { .. } => ErrorKind::RateLimited,
            ProviderError::Transient { .. } => ErrorKind::Transient,
            ProviderError::Fatal { .. } => ErrorKind::Fatal,
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            ProviderError::RateLimited { provider, .. }
            | ProviderError::Transient { provider, .. }
            | ProviderError::Fatal { provider, .. } => provider,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// A single aggregator sub-call failed; the affected field falls back to a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("trend extraction failed: {0}")]
    Trends(#[source] ProviderError),
    #[error("{language} daily summary failed: {source}")]
    Summary {
        language: Language,
        #[source]
        source: ProviderError,
    },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no AI providers configured")]
    NoProviders,
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("missing environment variable {0}")]
    MissingEnv(String),
    #[error("invalid provider {name}: {message}")]
    Provider { name: String, message: String },
    #[error("output path {} is not writable: {source}", .path.display())]
    OutputNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load {}: {message}", .path.display())]
    File { path: PathBuf, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Run-level failure reported to the operator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
