// src/ingest/types.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::FetchFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ja,
    En,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::Ja => "ja",
            Language::En => "en",
        }
    }

    /// Name used inside provider prompts.
    pub fn english_name(self) -> &'static str {
        match self {
            Language::Ja => "Japanese",
            Language::En => "English",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ja" | "jp" | "japanese" => Ok(Language::Ja),
            "en" | "english" => Ok(Language::En),
            other => Err(format!("unsupported language {other:?}")),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// One configured feed. Loaded once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub url: String,
    pub category: String,
    pub language: Language,
    #[serde(rename = "name", alias = "display_name")]
    pub display_name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl FeedSource {
    pub fn new(
        url: impl Into<String>,
        category: impl Into<String>,
        language: Language,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            category: category.into(),
            language,
            display_name: display_name.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A parsed feed entry, before any AI processing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArticle {
    pub title: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub source: FeedSource,
    pub content: Option<String>,
}

impl RawArticle {
    /// `url:<normalized url>`, or `title:<normalized title>|<source>` when the entry has no link.
    pub fn identity_key(&self) -> String {
        match self.url.as_deref().map(normalize_key).filter(|u| !u.is_empty()) {
            Some(url) => format!("url:{url}"),
            None => format!(
                "title:{}|{}",
                normalize_key(&self.title),
                normalize_key(&self.source.display_name)
            ),
        }
    }

    /// Secondary key catching the same story published under mirror URLs.
    pub fn title_key(&self) -> String {
        normalize_key(&self.title)
    }

    /// First 16 hex chars of SHA-256 over the identity key.
    pub fn stable_id(&self) -> String {
        let digest = Sha256::digest(self.identity_key().as_bytes());
        digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
    }

    /// Text handed to the summarize call.
    pub fn summary_input(&self) -> String {
        match self.content.as_deref().map(str::trim) {
            Some(content) if !content.is_empty() => format!("{}\n\n{}", self.title, content),
            _ => self.title.clone(),
        }
    }
}

/// Lower-cased, trimmed, whitespace-collapsed.
pub fn normalize_key(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Transport for feed bodies. The HTTP implementation lives in `ingest::http`;
/// tests plug in in-memory fetchers.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, source: &FeedSource) -> Result<String, FetchFailure>;
}
