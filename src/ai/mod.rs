//! Provider gateway: one request/response contract over interchangeable LLM
//! providers, each with its own capability set and call budget.

pub mod classify;
pub mod gateway;
pub mod http;
pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::error::{ErrorKind, ProviderError};
use crate::ingest::types::Language;
pub use gateway::ProviderGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Summarize,
    Translate,
    ExtractTrends,
}

impl Operation {
    pub const ALL: [Operation; 3] = [
        Operation::Summarize,
        Operation::Translate,
        Operation::ExtractTrends,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Summarize => "summarize",
            Operation::Translate => "translate",
            Operation::ExtractTrends => "extract_trends",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub operation: Operation,
    pub input_text: String,
    pub target_language: Language,
}

impl ProviderRequest {
    pub fn new(operation: Operation, input_text: impl Into<String>, target_language: Language) -> Self {
        Self {
            operation,
            input_text: input_text.into(),
            target_language,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProviderResponse {
    pub result_text: String,
    pub confidence: Option<f32>,
    pub tags: Vec<String>,
}

impl ProviderResponse {
    pub fn text(result_text: impl Into<String>) -> Self {
        Self {
            result_text: result_text.into(),
            ..Self::default()
        }
    }
}

/// A remote (or scripted) model endpoint.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> &[Operation] {
        &Operation::ALL
    }

    /// Calls per minute; 0 means no local throttling.
    fn requests_per_minute(&self) -> u32 {
        0
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}

pub type DynProvider = Arc<dyn Provider>;

#[derive(Debug, Deserialize)]
struct StructuredSummary {
    summary: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Read a `{summary, confidence, tags}` object out of model output, tolerating
/// code fences and surrounding prose. Falls back to the trimmed text.
pub fn parse_structured_summary(raw: &str) -> ProviderResponse {
    let trimmed = raw.trim();
    let json = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => return ProviderResponse::text(trimmed),
    };
    match serde_json::from_str::<StructuredSummary>(json) {
        Ok(s) => ProviderResponse {
            result_text: s.summary.trim().to_string(),
            confidence: s.confidence,
            tags: s.tags,
        },
        Err(_) => ProviderResponse::text(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_summary_inside_fences() {
        let raw = "```json\n{\"summary\": \" 要約 \", \"confidence\": 0.8, \"tags\": [\"LLM\"]}\n```";
        let r = parse_structured_summary(raw);
        assert_eq!(r.result_text, "要約");
        assert_eq!(r.confidence, Some(0.8));
        assert_eq!(r.tags, vec!["LLM".to_string()]);
    }

    #[test]
    fn plain_text_passes_through() {
        let r = parse_structured_summary("  just a sentence  ");
        assert_eq!(r.result_text, "just a sentence");
        assert_eq!(r.confidence, None);
        assert!(r.tags.is_empty());
    }
}
