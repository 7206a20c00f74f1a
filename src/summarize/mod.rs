// src/summarize/mod.rs
//! Summarization engine: RawArticle -> EnrichedArticle through the provider chain.

pub mod confidence;
pub mod retry;
pub mod text;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::ai::{Operation, ProviderGateway, ProviderRequest};
use crate::error::{ConfigError, ProviderError};
use crate::ingest::types::{Language, RawArticle};
use crate::metrics::ProcessingMetrics;
use crate::news::EnrichedArticle;
use confidence::ConfidencePolicy;
use retry::RetryPolicy;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "summarize_articles_failed_total",
            "Articles dropped after every provider failed."
        );
    });
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub batch_size: usize,
    pub display_language: Language,
    pub max_summary_chars: usize,
    pub batch_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            display_language: Language::Ja,
            max_summary_chars: 200,
            batch_delay: Duration::ZERO,
        }
    }
}

struct ArticleOutcome {
    result: Result<EnrichedArticle, ProviderError>,
    attempts: u32,
}

pub struct SummarizationEngine {
    gateway: Arc<ProviderGateway>,
    policy: RetryPolicy,
    confidence: ConfidencePolicy,
    config: EngineConfig,
}

impl SummarizationEngine {
    pub fn new(
        gateway: Arc<ProviderGateway>,
        policy: RetryPolicy,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        if gateway.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        if config.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "0"));
        }
        ensure_metrics_described();
        Ok(Self {
            gateway,
            policy,
            confidence: ConfidencePolicy::default(),
            config,
        })
    }

    pub fn with_confidence_policy(mut self, confidence: ConfidencePolicy) -> Self {
        self.confidence = confidence;
        self
    }

    /// Enrich `articles` in fixed-size batches. Output keeps input order and
    /// omits articles every provider failed on.
    pub async fn process(
        &self,
        articles: &[RawArticle],
        metrics: &mut ProcessingMetrics,
    ) -> Vec<EnrichedArticle> {
        let mut out = Vec::with_capacity(articles.len());
        let mut seen_ids = HashSet::new();

        for (batch_no, batch) in articles.chunks(self.config.batch_size).enumerate() {
            if batch_no > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
            tracing::debug!(target: "summarize", batch = batch_no + 1, size = batch.len(), "processing batch");

            let outcomes = join_all(batch.iter().map(|a| self.enrich(a))).await;
            for (article, outcome) in batch.iter().zip(outcomes) {
                metrics.api_calls_made += u64::from(outcome.attempts);
                match outcome.result {
                    Ok(enriched) => {
                        if seen_ids.insert(enriched.id.clone()) {
                            metrics.articles_processed += 1;
                            out.push(enriched);
                        } else {
                            tracing::debug!(target: "summarize", id = %enriched.id, "duplicate id dropped");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            target: "summarize",
                            title = %article.title,
                            error = %e,
                            "article failed on every provider"
                        );
                        counter!("summarize_articles_failed_total").increment(1);
                        metrics.articles_failed += 1;
                        metrics.record_error(format!("summarize failed for {:?}: {e}", article.title));
                    }
                }
            }
        }

        tracing::info!(
            target: "summarize",
            processed = out.len(),
            total = articles.len(),
            "summarization finished"
        );
        out
    }

    async fn enrich(&self, article: &RawArticle) -> ArticleOutcome {
        let input = article.summary_input();
        let request =
            ProviderRequest::new(Operation::Summarize, input.as_str(), self.config.display_language);
        let summarized = self.policy.execute(&self.gateway, &request).await;
        let mut attempts = summarized.attempts;

        let served = match summarized.result {
            Ok(served) => served,
            Err(e) => return ArticleOutcome { result: Err(e), attempts },
        };

        // blank replies were already rejected by the gateway and fell back
        let summary = text::truncate_summary(&served.response.result_text, self.config.max_summary_chars);

        let title = if article.source.language != self.config.display_language {
            let (translated, cost) = self.translate_title(&article.title).await;
            attempts += cost;
            translated
        } else {
            article.title.clone()
        };

        let ai_confidence = self.confidence.resolve(
            served.response.confidence,
            summary.chars().count(),
            input.chars().count(),
            &article.source.category,
        );

        ArticleOutcome {
            result: Ok(EnrichedArticle {
                id: article.stable_id(),
                title,
                original_title: article.title.clone(),
                summary,
                url: article.url.clone().unwrap_or_default(),
                source_name: article.source.display_name.clone(),
                category: article.source.category.clone(),
                published_at: article.published_at,
                language: article.source.language,
                tags: text::normalize_tags(served.response.tags),
                ai_confidence,
            }),
            attempts,
        }
    }

    /// Translated title, or the original when every provider fails.
    async fn translate_title(&self, title: &str) -> (String, u32) {
        let request = ProviderRequest::new(Operation::Translate, title, self.config.display_language);
        let outcome = self.policy.execute(&self.gateway, &request).await;
        let translated = match outcome.result {
            Ok(served) => {
                let cleaned = text::clean_translation(&served.response.result_text);
                if cleaned.is_empty() {
                    title.to_string()
                } else {
                    cleaned
                }
            }
            Err(e) => {
                tracing::warn!(target: "summarize", title, error = %e, "translation failed, keeping original title");
                title.to_string()
            }
        };
        (translated, outcome.attempts)
    }
}
