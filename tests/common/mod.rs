// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ai_news_aggregator::error::FetchFailure;
use ai_news_aggregator::ingest::types::{FeedFetcher, FeedSource};
use ai_news_aggregator::Language;

/// In-memory feeds keyed by URL, with optional per-URL latency.
#[derive(Default)]
pub struct MemoryFetcher {
    bodies: HashMap<String, Result<String, FetchFailure>>,
    delays: HashMap<String, Duration>,
    hits: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    // host -> (running, peak)
    in_flight: Mutex<HashMap<String, (usize, usize)>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(mut self, url: &str, xml: impl Into<String>) -> Self {
        self.bodies.insert(url.to_string(), Ok(xml.into()));
        self
    }

    pub fn failing(mut self, url: &str, failure: FetchFailure) -> Self {
        self.bodies.insert(url.to_string(), Err(failure));
        self
    }

    pub fn slow(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Most fetches seen running at once against `host`.
    pub fn peak_for_host(&self, host: &str) -> usize {
        self.in_flight.lock().unwrap().get(host).map_or(0, |(_, peak)| *peak)
    }

    fn enter(&self, host: &str) -> InFlight<'_> {
        let mut map = self.in_flight.lock().unwrap();
        let (running, peak) = map.entry(host.to_string()).or_insert((0, 0));
        *running += 1;
        *peak = (*peak).max(*running);
        InFlight {
            fetcher: self,
            host: host.to_string(),
        }
    }
}

/// Decrements the running count even when the fetch is cancelled by a timeout.
struct InFlight<'a> {
    fetcher: &'a MemoryFetcher,
    host: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some((running, _)) = self.fetcher.in_flight.lock().unwrap().get_mut(&self.host) {
            *running -= 1;
        }
    }
}

fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

#[async_trait]
impl FeedFetcher for MemoryFetcher {
    async fn fetch(&self, source: &FeedSource) -> Result<String, FetchFailure> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.hits.lock().unwrap().entry(source.url.clone()).or_insert(0) += 1;
        let _running = self.enter(&host_of(&source.url));
        if let Some(delay) = self.delays.get(&source.url) {
            tokio::time::sleep(*delay).await;
        }
        self.bodies
            .get(&source.url)
            .cloned()
            .unwrap_or(Err(FetchFailure::Http(404)))
    }
}

pub fn source(url: &str, category: &str, language: Language, name: &str) -> FeedSource {
    FeedSource::new(url, category, language, name)
}

/// RSS 2.0 body; each item is `(title, link, rfc2822 date)`.
pub fn rss(items: &[(&str, &str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link, date)| {
            format!(
                "<item><title>{title}</title><link>{link}</link><pubDate>{date}</pubDate>\
                 <description>About {title}</description></item>"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>t</title>{body}</channel></rss>"
    )
}

/// Atom body; each entry is `(title, href, rfc3339 date)`.
pub fn atom(entries: &[(&str, &str, &str)]) -> String {
    let body: String = entries
        .iter()
        .map(|(title, href, date)| {
            format!(
                "<entry><title>{title}</title><link rel=\"alternate\" href=\"{href}\"/>\
                 <published>{date}</published><summary>About {title}</summary></entry>"
            )
        })
        .collect();
    format!("<?xml version=\"1.0\"?><feed xmlns=\"http://www.w3.org/2005/Atom\"><title>a</title>{body}</feed>")
}
