// src/pipeline.rs
//! One full run: collect → skip check → summarize → aggregate → persist → cleanup,
//! with the metrics record flushed at the end whatever happened before.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};

use crate::ai::{DynProvider, ProviderGateway};
use crate::analyze::TrendAggregator;
use crate::config::RunConfig;
use crate::error::{ConfigError, PipelineError};
use crate::ingest::types::{FeedFetcher, FeedSource};
use crate::ingest::FeedCollector;
use crate::metrics::ProcessingMetrics;
use crate::store::{CleanupReport, DataStore};
use crate::summarize::SummarizationEngine;

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub date: NaiveDate,
    pub articles_saved: usize,
    pub summary_saved: bool,
    /// Output for `date` already existed and `skip_existing` was set.
    pub skipped_existing: bool,
    pub cleanup: CleanupReport,
    pub metrics_path: Option<PathBuf>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub metrics: ProcessingMetrics,
    pub result: Result<RunReport, PipelineError>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Pipeline {
    config: RunConfig,
    collector: FeedCollector,
    engine: SummarizationEngine,
    aggregator: TrendAggregator,
    store: DataStore,
}

impl Pipeline {
    /// Wire every stage from `config`. Fails on an empty provider list, bad
    /// batch settings or an unwritable output root.
    pub fn new(
        config: RunConfig,
        fetcher: Arc<dyn FeedFetcher>,
        providers: Vec<DynProvider>,
    ) -> Result<Self, ConfigError> {
        let gateway = Arc::new(ProviderGateway::new(providers, config.provider_timeout)?);
        let collector = FeedCollector::new(fetcher, config.collector_config());
        let engine =
            SummarizationEngine::new(gateway.clone(), config.retry_policy(), config.engine_config())?;
        let aggregator =
            TrendAggregator::new(gateway.clone(), config.retry_policy(), config.display_language);
        let store = DataStore::open(&config.output_path, config.latest_limit)?;

        tracing::info!(
            providers = ?gateway.provider_names(),
            output = %config.output_path.display(),
            "pipeline ready"
        );
        Ok(Self {
            config,
            collector,
            engine,
            aggregator,
            store,
        })
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// Local calendar date unless the config pins one.
    pub fn run_date(&self) -> NaiveDate {
        self.config
            .run_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    pub async fn run(&self, sources: &[FeedSource]) -> RunOutcome {
        let mut metrics = ProcessingMetrics::start(Utc::now());
        let date = self.run_date();
        tracing::info!(%date, sources = sources.len(), "run started");

        let mut result = self.execute(date, sources, &mut metrics).await;

        metrics.finish(Utc::now());
        match self.store.save_processing_metrics(&metrics) {
            Ok(path) => {
                if let Ok(report) = result.as_mut() {
                    report.metrics_path = Some(path);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to save processing metrics");
                metrics.record_error(e.to_string());
                if result.is_ok() {
                    result = Err(e.into());
                }
            }
        }

        match &result {
            Ok(report) => tracing::info!(
                %date,
                collected = metrics.articles_collected,
                processed = metrics.articles_processed,
                failed = metrics.articles_failed,
                api_calls = metrics.api_calls_made,
                errors = metrics.errors.len(),
                saved = report.articles_saved,
                "run finished"
            ),
            Err(e) => tracing::error!(%date, error = %e, "run failed"),
        }
        RunOutcome { metrics, result }
    }

    async fn execute(
        &self,
        date: NaiveDate,
        sources: &[FeedSource],
        metrics: &mut ProcessingMetrics,
    ) -> Result<RunReport, PipelineError> {
        let mut report = RunReport {
            date,
            articles_saved: 0,
            summary_saved: false,
            skipped_existing: false,
            cleanup: CleanupReport::default(),
            metrics_path: None,
        };

        let existing = if self.config.skip_existing {
            self.store.load_existing_data(date)?
        } else {
            None
        };

        match existing {
            Some(articles) if !articles.is_empty() => {
                tracing::info!(%date, count = articles.len(), "output already present; skipping collection");
                report.skipped_existing = true;
            }
            _ => {
                let raw = self.collector.collect_all(sources, metrics.start_time, metrics).await;
                let enriched = self.engine.process(&raw, metrics).await;

                if enriched.is_empty() {
                    tracing::warn!(%date, collected = raw.len(), "nothing to publish; keeping previous output");
                } else {
                    let summary = self
                        .aggregator
                        .analyze_daily_trends(date, &enriched, metrics)
                        .await;
                    self.store.save_daily_news(date, &enriched)?;
                    report.articles_saved = enriched.len();
                    self.store.save_daily_summary(&summary)?;
                    report.summary_saved = true;
                }
                self.store.save_config_files(sources)?;
            }
        }

        report.cleanup = self.store.cleanup_old_data(self.config.retention_days, date)?;
        Ok(report)
    }
}
