// src/analyze/mod.rs
//! Daily roll-up: trends, significant news, category breakdown and the
//! bilingual summary for one run.

pub mod trends;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::ai::{Operation, ProviderGateway, ProviderRequest};
use crate::error::AggregationError;
use crate::ingest::types::Language;
use crate::metrics::ProcessingMetrics;
use crate::news::{DailySummary, EnrichedArticle};
use crate::summarize::retry::RetryPolicy;

pub const MAX_TRENDS: usize = 5;
pub const MAX_SIGNIFICANT: usize = 5;
pub const TREND_INPUT_CHARS: usize = 3000;
pub const SUMMARY_INPUT_ARTICLES: usize = 10;

/// Top `limit` by confidence, newest first on ties.
pub fn select_significant(articles: &[EnrichedArticle], limit: usize) -> Vec<EnrichedArticle> {
    let mut ranked: Vec<&EnrichedArticle> = articles.iter().collect();
    ranked.sort_by(|a, b| {
        b.ai_confidence
            .total_cmp(&a.ai_confidence)
            .then_with(|| b.published_at.cmp(&a.published_at))
    });
    ranked.into_iter().take(limit).cloned().collect()
}

pub fn category_breakdown(articles: &[EnrichedArticle]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for a in articles {
        *counts.entry(a.category.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn fallback_summary(language: Language, count: usize) -> String {
    match language {
        Language::Ja => format!("本日は{count}件のAI関連ニュースを収集しました。"),
        Language::En => format!("Collected {count} AI-related news articles today."),
    }
}

pub struct TrendAggregator {
    gateway: Arc<ProviderGateway>,
    policy: RetryPolicy,
    trend_language: Language,
}

impl TrendAggregator {
    pub fn new(gateway: Arc<ProviderGateway>, policy: RetryPolicy, trend_language: Language) -> Self {
        Self {
            gateway,
            policy,
            trend_language,
        }
    }

    /// Never fails: each provider-backed field falls back independently.
    pub async fn analyze_daily_trends(
        &self,
        date: NaiveDate,
        articles: &[EnrichedArticle],
        metrics: &mut ProcessingMetrics,
    ) -> DailySummary {
        if articles.is_empty() {
            tracing::info!(target: "analyze", %date, "no articles; writing placeholder summary");
            return DailySummary::empty(date, Utc::now());
        }

        let digest = trends::trend_digest(articles, TREND_INPUT_CHARS);
        let daily_input = trends::summary_digest(articles, SUMMARY_INPUT_ARTICLES);

        let (trends, ja, en) = tokio::join!(
            self.extract_trends(&digest),
            self.daily_summary(&daily_input, Language::Ja),
            self.daily_summary(&daily_input, Language::En),
        );

        metrics.api_calls_made += u64::from(trends.1 + ja.1 + en.1);

        let top_trends = trends.0.unwrap_or_else(|e| {
            record(metrics, &e);
            Vec::new()
        });
        let summary_ja = ja.0.unwrap_or_else(|e| {
            record(metrics, &e);
            fallback_summary(Language::Ja, articles.len())
        });
        let summary_en = en.0.unwrap_or_else(|e| {
            record(metrics, &e);
            fallback_summary(Language::En, articles.len())
        });

        DailySummary {
            date,
            total_articles: articles.len(),
            top_trends,
            significant_news: select_significant(articles, MAX_SIGNIFICANT),
            category_breakdown: category_breakdown(articles),
            summary_ja,
            summary_en,
            generated_at: Utc::now(),
        }
    }

    async fn extract_trends(&self, digest: &str) -> (Result<Vec<String>, AggregationError>, u32) {
        let request = ProviderRequest::new(Operation::ExtractTrends, digest, self.trend_language);
        let outcome = self.policy.execute(&self.gateway, &request).await;
        let result = outcome
            .result
            .map(|served| trends::parse_trends(&served.response.result_text, MAX_TRENDS))
            .map_err(AggregationError::Trends);
        (result, outcome.attempts)
    }

    async fn daily_summary(
        &self,
        input: &str,
        language: Language,
    ) -> (Result<String, AggregationError>, u32) {
        let request = ProviderRequest::new(Operation::Summarize, input, language);
        let outcome = self.policy.execute(&self.gateway, &request).await;
        let result = outcome
            .result
            .map(|served| served.response.result_text.trim().to_string())
            .map_err(|source| AggregationError::Summary { language, source });
        (result, outcome.attempts)
    }
}

fn record(metrics: &mut ProcessingMetrics, error: &AggregationError) {
    tracing::warn!(target: "analyze", error = %error, "aggregation step failed; using default");
    metrics.record_error(error.to_string());
}
