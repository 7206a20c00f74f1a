// src/ingest/http.rs
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchFailure;
use crate::ingest::types::{FeedFetcher, FeedSource};

const USER_AGENT: &str = "ai-news-aggregator/0.1 (+rss collector)";

/// Fetches feed bodies over HTTP with reqwest.
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, source: &FeedSource) -> Result<String, FetchFailure> {
        let resp = self
            .client
            .get(&source.url)
            .header(
                reqwest::header::ACCEPT,
                "application/rss+xml, application/atom+xml, application/xml;q=0.9, */*;q=0.8",
            )
            .send()
            .await
            .map_err(map_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchFailure::Http(status.as_u16()));
        }
        resp.text().await.map_err(map_reqwest)
    }
}

fn map_reqwest(e: reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Timeout
    } else {
        FetchFailure::Network(e.to_string())
    }
}
