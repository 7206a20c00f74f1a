// tests/pipeline.rs
mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use ai_news_aggregator::ai::mock::{MockProvider, ScriptedProvider};
use ai_news_aggregator::ai::DynProvider;
use ai_news_aggregator::{ConfigError, Language, Pipeline, ProviderError, RunConfig};
use chrono::NaiveDate;
use common::{atom, rss, source, MemoryFetcher};

const A: &str = "https://a.example/feed";
const B: &str = "https://b.example/feed";

fn config(root: &Path) -> RunConfig {
    RunConfig {
        output_path: root.to_path_buf(),
        run_date: NaiveDate::from_ymd_opt(2025, 3, 2),
        ..RunConfig::default()
    }
}

fn fetcher() -> Arc<MemoryFetcher> {
    Arc::new(
        MemoryFetcher::new()
            .body(
                A,
                rss(&[
                    ("Claude gets a new tool", "https://a.example/1", "Sun, 02 Mar 2025 09:00:00 GMT"),
                    ("Benchmarks revisited", "https://a.example/2", "Sun, 02 Mar 2025 08:00:00 GMT"),
                ]),
            )
            .body(B, atom(&[("国産LLMの公開", "https://b.example/1", "2025-03-02T10:00:00+09:00")])),
    )
}

fn sources() -> Vec<ai_news_aggregator::FeedSource> {
    vec![
        source(A, "Claude", Language::En, "Feed A"),
        source(B, "国内", Language::Ja, "Feed B"),
    ]
}

fn metrics_files(root: &Path) -> usize {
    fs::read_dir(root.join("metrics")).unwrap().count()
}

#[tokio::test(start_paused = true)]
async fn full_run_writes_the_frontend_tree() {
    let dir = tempfile::tempdir().unwrap();
    let mock: DynProvider = Arc::new(MockProvider::default());
    let pipeline = Pipeline::new(config(dir.path()), fetcher(), vec![mock]).unwrap();

    let outcome = pipeline.run(&sources()).await;

    assert!(outcome.is_success(), "{:?}", outcome.result);
    let report = outcome.result.as_ref().unwrap();
    assert_eq!(report.articles_saved, 3);
    assert!(report.summary_saved);
    assert!(report.metrics_path.as_ref().is_some_and(|p| p.is_file()));

    let m = &outcome.metrics;
    assert_eq!(m.articles_collected, 3);
    assert_eq!(m.articles_processed, 3);
    assert_eq!(m.articles_failed, 0);
    // 3 summaries, 2 title translations, trends and two daily summaries
    assert_eq!(m.api_calls_made, 8);
    assert!(m.end_time.is_some());

    let root = dir.path();
    for file in [
        "news/2025-03-02/articles.json",
        "news/2025-03-02/metadata.json",
        "news/latest.json",
        "summaries/2025-03-02.json",
        "summaries/latest.json",
        "config/categories.json",
        "config/sources.json",
    ] {
        assert!(root.join(file).is_file(), "missing {file}");
    }
    assert_eq!(metrics_files(root), 1);

    let summary = pipeline
        .store()
        .load_summary(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(summary.total_articles, 3);
    assert_eq!(summary.category_breakdown["Claude"], 2);
}

#[tokio::test(start_paused = true)]
async fn existing_output_is_skipped_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = fetcher();
    let mock: DynProvider = Arc::new(MockProvider::default());
    let cfg = RunConfig {
        skip_existing: true,
        ..config(dir.path())
    };
    let pipeline = Pipeline::new(cfg, fetcher.clone(), vec![mock]).unwrap();

    let first = pipeline.run(&sources()).await;
    assert!(!first.result.unwrap().skipped_existing);
    let fetched = fetcher.total_hits();

    let second = pipeline.run(&sources()).await;
    let report = second.result.unwrap();
    assert!(report.skipped_existing);
    assert_eq!(report.articles_saved, 0);
    assert_eq!(fetcher.total_hits(), fetched);
    assert_eq!(second.metrics.api_calls_made, 0);
}

#[tokio::test(start_paused = true)]
async fn provider_outage_keeps_previous_output_and_still_flushes_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let down: DynProvider = Arc::new(ScriptedProvider::always_err(
        "down",
        ProviderError::fatal("down", "invalid api key"),
    ));
    let pipeline = Pipeline::new(config(dir.path()), fetcher(), vec![down]).unwrap();

    let outcome = pipeline.run(&sources()).await;

    let report = outcome.result.as_ref().unwrap();
    assert_eq!(report.articles_saved, 0);
    assert!(!report.summary_saved);
    assert_eq!(outcome.metrics.articles_collected, 3);
    assert_eq!(outcome.metrics.articles_failed, 3);
    assert_eq!(outcome.metrics.success_rate(), 0.0);
    assert!(!dir.path().join("news/2025-03-02").exists());
    assert_eq!(metrics_files(dir.path()), 1);
}

#[test]
fn no_providers_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Pipeline::new(config(dir.path()), fetcher(), Vec::new())
        .err()
        .unwrap();
    assert!(matches!(err, ConfigError::NoProviders));
}
