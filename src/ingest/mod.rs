// src/ingest/mod.rs
pub mod feed;
pub mod http;
pub mod types;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use crate::error::{CollectionError, FetchFailure};
use crate::ingest::types::{FeedFetcher, FeedSource, RawArticle};
use crate::metrics::ProcessingMetrics;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_articles_total",
            "Articles kept after deduplication."
        );
        describe_counter!(
            "ingest_sources_failed_total",
            "Feeds that produced no articles (fetch/parse errors)."
        );
        describe_counter!("ingest_dedup_total", "Articles removed as duplicates.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Normalize feed text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Keep the first occurrence per identity key or normalized title, in input order.
/// Returns the survivors and the number removed.
pub fn deduplicate(articles: Vec<RawArticle>) -> (Vec<RawArticle>, usize) {
    let before = articles.len();
    let kept = dedup_by(articles, |a| a);
    let removed = before - kept.len();
    (kept, removed)
}

fn dedup_by<T>(items: Vec<T>, article: impl Fn(&T) -> &RawArticle) -> Vec<T> {
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut keep = Vec::with_capacity(items.len());
    for item in items {
        let a = article(&item);
        let key = a.identity_key();
        let title = a.title_key();
        if seen_keys.contains(&key) || (!title.is_empty() && seen_titles.contains(&title)) {
            continue;
        }
        seen_keys.insert(key);
        seen_titles.insert(title);
        keep.push(item);
    }
    keep
}

/// Newest first; ties keep source priority (registry position) then fetch order.
pub fn sort_for_output(mut prioritized: Vec<(usize, RawArticle)>) -> Vec<RawArticle> {
    // stable sort: equal keys retain fetch order
    prioritized.sort_by(|(pa, a), (pb, b)| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| pa.cmp(pb))
    });
    prioritized.into_iter().map(|(_, a)| a).collect()
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub fetch_timeout: Duration,
    /// Extra attempts after the first for transient failures.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub per_host_concurrency: usize,
    pub max_article_age: Option<chrono::Duration>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
            per_host_concurrency: 2,
            max_article_age: None,
        }
    }
}

/// Per-host cap on in-flight fetches.
struct HostBudget {
    limit: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HostBudget {
    fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, host: &str) -> Option<OwnedSemaphorePermit> {
        let sem = {
            let mut hosts = self.hosts.lock().await;
            hosts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.limit)))
                .clone()
        };
        sem.acquire_owned().await.ok()
    }
}

fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default()
}

/// Fetches every enabled source concurrently; one broken feed never affects the others.
pub struct FeedCollector {
    fetcher: Arc<dyn FeedFetcher>,
    config: CollectorConfig,
    hosts: HostBudget,
}

impl FeedCollector {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, config: CollectorConfig) -> Self {
        let hosts = HostBudget::new(config.per_host_concurrency);
        Self {
            fetcher,
            config,
            hosts,
        }
    }

    /// Collect, deduplicate and order articles from `sources`.
    ///
    /// Adds the surviving count to `articles_collected` and one error string per
    /// failed source to `errors`.
    pub async fn collect_all(
        &self,
        sources: &[FeedSource],
        run_time: DateTime<Utc>,
        metrics: &mut ProcessingMetrics,
    ) -> Vec<RawArticle> {
        ensure_metrics_described();

        let enabled: Vec<(usize, &FeedSource)> = sources
            .iter()
            .enumerate()
            .filter(|(_, s)| s.enabled)
            .collect();

        let results = join_all(
            enabled
                .iter()
                .map(|(_, source)| self.collect_source(source, run_time)),
        )
        .await;

        let mut prioritized = Vec::new();
        for ((priority, source), result) in enabled.iter().zip(results) {
            match result {
                Ok(articles) => {
                    tracing::info!(
                        target: "ingest",
                        source = %source.display_name,
                        count = articles.len(),
                        "feed collected"
                    );
                    prioritized.extend(articles.into_iter().map(|a| (*priority, a)));
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", error = %e, url = %source.url, "feed failed");
                    counter!("ingest_sources_failed_total").increment(1);
                    metrics.record_error(e.to_string());
                }
            }
        }

        let before = prioritized.len();
        let unique = dedup_by(prioritized, |(_, a)| a);
        let duplicates = before - unique.len();
        counter!("ingest_dedup_total").increment(duplicates as u64);

        let mut articles = sort_for_output(unique);
        if let Some(max_age) = self.config.max_article_age {
            let cutoff = run_time - max_age;
            articles.retain(|a| a.published_at >= cutoff);
        }

        tracing::info!(
            target: "ingest",
            total = articles.len(),
            duplicates,
            "collection finished"
        );
        counter!("ingest_articles_total").increment(articles.len() as u64);
        metrics.articles_collected += articles.len();
        articles
    }

    async fn collect_source(
        &self,
        source: &FeedSource,
        run_time: DateTime<Utc>,
    ) -> Result<Vec<RawArticle>, CollectionError> {
        let fail = |reason: FetchFailure| CollectionError::new(source.display_name.clone(), reason);
        let body = self.fetch_with_retry(source).await.map_err(fail)?;
        let articles = feed::parse_feed(&body, source, run_time).map_err(fail)?;
        if articles.is_empty() {
            return Err(fail(FetchFailure::Empty));
        }
        Ok(articles)
    }

    async fn fetch_with_retry(&self, source: &FeedSource) -> Result<String, FetchFailure> {
        let host = host_of(&source.url);
        let mut attempt = 0u32;
        loop {
            let result = {
                let _permit = self.hosts.acquire(&host).await;
                match tokio::time::timeout(self.config.fetch_timeout, self.fetcher.fetch(source))
                    .await
                {
                    Ok(r) => r,
                    Err(_) => Err(FetchFailure::Timeout),
                }
            };

            match result {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self
                        .config
                        .retry_base_delay
                        .saturating_mul(1u32 << attempt.min(16));
                    tracing::debug!(
                        target: "ingest",
                        url = %source.url,
                        error = %e,
                        attempt,
                        ?delay,
                        "retrying feed fetch"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Language;
    use chrono::TimeZone;

    fn art(title: &str, url: Option<&str>, hour: u32, source: &str) -> RawArticle {
        RawArticle {
            title: title.into(),
            url: url.map(Into::into),
            published_at: Utc.with_ymd_and_hms(2025, 1, 1, hour, 0, 0).unwrap(),
            source: FeedSource::new("https://x.example/rss", "海外", Language::En, source),
            content: None,
        }
    }

    #[test]
    fn normalize_text_decodes_strips_and_collapses() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b></p>  ";
        assert_eq!(normalize_text(s), "Hello, world");
        assert_eq!(normalize_text("Is AI overhyped?"), "Is AI overhyped?");
    }

    #[test]
    fn normalize_text_caps_length() {
        let long = "あ".repeat(2000);
        assert_eq!(normalize_text(&long).chars().count(), 1500);
    }

    #[test]
    fn dedup_keeps_first_by_url_and_by_title() {
        let items = vec![
            art("One", Some("https://a.example/1"), 1, "A"),
            art("Other title", Some("HTTPS://A.example/1 "), 2, "B"),
            art("one", Some("https://mirror.example/1"), 3, "C"),
            art("Two", None, 4, "A"),
        ];
        let (kept, removed) = deduplicate(items);
        assert_eq!(removed, 2);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].source.display_name, "A");
        assert_eq!(kept[1].title, "Two");
    }

    #[test]
    fn output_sorted_newest_first_ties_by_priority() {
        let a = art("a", Some("https://x/a"), 5, "S1");
        let b = art("b", Some("https://x/b"), 9, "S2");
        let c = art("c", Some("https://x/c"), 5, "S0");
        let out = sort_for_output(vec![(1, a), (2, b), (0, c)]);
        let titles: Vec<_> = out.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "c", "a"]);
    }

    #[test]
    fn host_extraction() {
        assert_eq!(host_of("https://WWW.Reddit.com/r/x/.rss"), "www.reddit.com");
        assert_eq!(host_of("not a url"), "");
    }
}
