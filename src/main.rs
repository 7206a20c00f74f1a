//! AI news aggregator: one run per invocation.
//! Collects the configured feeds, summarizes through the provider chain and
//! writes the JSON tree the frontend reads.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ai_news_aggregator::ai::mock::MockProvider;
use ai_news_aggregator::ai::DynProvider;
use ai_news_aggregator::config::{build_providers, load_sources_default};
use ai_news_aggregator::ingest::http::HttpFeedFetcher;
use ai_news_aggregator::{Pipeline, RunConfig};

/// `RUST_LOG` wins; `LOG_FORMAT=json` switches to structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ai_news_aggregator=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn providers_for(config: &RunConfig) -> anyhow::Result<Vec<DynProvider>> {
    let mock = std::env::var("AI_TEST_MODE")
        .map(|v| v.eq_ignore_ascii_case("mock"))
        .unwrap_or(false);
    if mock {
        tracing::warn!("AI_TEST_MODE=mock: using the deterministic mock provider");
        let p: DynProvider = Arc::new(MockProvider::new("mock"));
        return Ok(vec![p]);
    }
    build_providers(&config.providers).context("building AI providers")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = RunConfig::from_env().context("reading configuration")?;
    let sources = load_sources_default().context("loading feed sources")?;
    let providers = providers_for(&config)?;

    let fetcher = HttpFeedFetcher::new(config.feed_timeout)
        .context("building HTTP client")?;
    let pipeline = Pipeline::new(config, Arc::new(fetcher), providers)?;

    let outcome = pipeline.run(&sources).await;
    let report = outcome.metrics.report();
    println!("{}", serde_json::to_string_pretty(&report)?);

    match outcome.result {
        Ok(run) => {
            tracing::info!(
                date = %run.date,
                saved = run.articles_saved,
                skipped = run.skipped_existing,
                success_rate = report.success_rate,
                "done"
            );
            Ok(())
        }
        Err(e) => bail!("run failed: {e}"),
    }
}
