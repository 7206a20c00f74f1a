// src/news.rs
// Records published to the frontend.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::types::Language;

pub const EMPTY_SUMMARY_JA: &str = "本日はAI関連のニュースがありませんでした。";
pub const EMPTY_SUMMARY_EN: &str = "No AI-related news today.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedArticle {
    pub id: String,
    pub title: String,
    pub original_title: String,
    pub summary: String,
    pub url: String,
    #[serde(rename = "source")]
    pub source_name: String,
    pub category: String,
    pub published_at: DateTime<Utc>,
    pub language: Language,
    #[serde(default)]
    pub tags: Vec<String>,
    pub ai_confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_articles: usize,
    pub top_trends: Vec<String>,
    pub significant_news: Vec<EnrichedArticle>,
    pub category_breakdown: BTreeMap<String, usize>,
    pub summary_ja: String,
    pub summary_en: String,
    pub generated_at: DateTime<Utc>,
}

impl DailySummary {
    /// Summary for a day without articles.
    pub fn empty(date: NaiveDate, generated_at: DateTime<Utc>) -> Self {
        Self {
            date,
            total_articles: 0,
            top_trends: Vec::new(),
            significant_news: Vec::new(),
            category_breakdown: BTreeMap::new(),
            summary_ja: EMPTY_SUMMARY_JA.to_string(),
            summary_en: EMPTY_SUMMARY_EN.to_string(),
            generated_at,
        }
    }
}
