// src/store/mod.rs
//! On-disk layout consumed by the frontend:
//!
//! ```text
//! news/{date}/articles.json   news/{date}/metadata.json   news/latest.json
//! summaries/{date}.json       summaries/latest.json
//! metrics/metrics_{stamp}.json
//! config/categories.json      config/sources.json
//! ```

mod atomic;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, NaiveDate, Utc};
use metrics::describe_counter;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::config::CATEGORIES;
use crate::error::{ConfigError, PersistenceError};
use crate::ingest::types::FeedSource;
use crate::metrics::ProcessingMetrics;
use crate::news::{DailySummary, EnrichedArticle};

const NEWS: &str = "news";
const SUMMARIES: &str = "summaries";
const METRICS: &str = "metrics";
const CONFIG: &str = "config";
const LATEST: &str = "latest.json";
const DATE_FMT: &str = "%Y-%m-%d";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("store_writes_total", "JSON files atomically written by the data store.");
    });
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsMetadata {
    pub total: usize,
    pub categories: Vec<String>,
    pub sources: BTreeMap<String, usize>,
    pub languages: BTreeMap<String, usize>,
    pub generated_at: DateTime<Utc>,
}

impl NewsMetadata {
    pub fn describe(articles: &[EnrichedArticle], generated_at: DateTime<Utc>) -> Self {
        let categories: BTreeSet<&str> = articles.iter().map(|a| a.category.as_str()).collect();
        let mut sources = BTreeMap::new();
        let mut languages = BTreeMap::new();
        for a in articles {
            *sources.entry(a.source_name.clone()).or_insert(0) += 1;
            *languages.entry(a.language.code().to_string()).or_insert(0) += 1;
        }
        Self {
            total: articles.len(),
            categories: categories.into_iter().map(String::from).collect(),
            sources,
            languages,
            generated_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub news_removed: Vec<NaiveDate>,
    pub summaries_removed: Vec<NaiveDate>,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.news_removed.is_empty() && self.summaries_removed.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
    latest_limit: usize,
}

impl DataStore {
    /// Create the directory tree under `root` and check it accepts writes.
    pub fn open(root: impl Into<PathBuf>, latest_limit: usize) -> Result<Self, ConfigError> {
        let root = root.into();
        for dir in [NEWS, SUMMARIES, METRICS, CONFIG] {
            let path = root.join(dir);
            fs::create_dir_all(&path)
                .map_err(|source| ConfigError::OutputNotWritable { path, source })?;
        }

        let probe = root.join(".write_probe");
        fs::write(&probe, b"ok")
            .and_then(|_| fs::remove_file(&probe))
            .map_err(|source| ConfigError::OutputNotWritable {
                path: root.clone(),
                source,
            })?;

        ensure_metrics_described();
        Ok(Self { root, latest_limit })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn news_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(NEWS).join(date.format(DATE_FMT).to_string())
    }

    pub fn summary_path(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join(SUMMARIES)
            .join(format!("{}.json", date.format(DATE_FMT)))
    }

    /// Write the day's articles and metadata, then refresh `news/latest.json`.
    pub fn save_daily_news(
        &self,
        date: NaiveDate,
        articles: &[EnrichedArticle],
    ) -> Result<(), PersistenceError> {
        let dir = self.news_dir(date);
        atomic::write_json(&dir.join("articles.json"), articles)?;
        atomic::write_json(
            &dir.join("metadata.json"),
            &NewsMetadata::describe(articles, Utc::now()),
        )?;
        tracing::info!(target: "store", %date, count = articles.len(), "saved daily news");
        self.refresh_latest_news()
    }

    /// Write `summaries/{date}.json`, then refresh `summaries/latest.json`.
    pub fn save_daily_summary(&self, summary: &DailySummary) -> Result<(), PersistenceError> {
        atomic::write_json(&self.summary_path(summary.date), summary)?;
        tracing::info!(target: "store", date = %summary.date, "saved daily summary");
        self.refresh_latest_summary()
    }

    /// Articles previously saved for `date`, or `None` when there are none on disk.
    pub fn load_existing_data(
        &self,
        date: NaiveDate,
    ) -> Result<Option<Vec<EnrichedArticle>>, PersistenceError> {
        atomic::read_json(&self.news_dir(date).join("articles.json"))
    }

    pub fn load_summary(&self, date: NaiveDate) -> Result<Option<DailySummary>, PersistenceError> {
        atomic::read_json(&self.summary_path(date))
    }

    /// Remove news partitions and summaries dated before `today - retention_days`.
    /// Entries whose names are not `YYYY-MM-DD` are never touched.
    pub fn cleanup_old_data(
        &self,
        retention_days: u32,
        today: NaiveDate,
    ) -> Result<CleanupReport, PersistenceError> {
        let cutoff = today
            .checked_sub_days(Days::new(u64::from(retention_days)))
            .unwrap_or(NaiveDate::MIN);
        let mut report = CleanupReport::default();

        for (date, path) in partitions(&self.root.join(NEWS), Partition::Dir)? {
            if date < cutoff {
                remove(&path, |p| fs::remove_dir_all(p))?;
                report.news_removed.push(date);
            }
        }
        for (date, path) in partitions(&self.root.join(SUMMARIES), Partition::File)? {
            if date < cutoff {
                remove(&path, |p| fs::remove_file(p))?;
                report.summaries_removed.push(date);
            }
        }

        if !report.is_empty() {
            tracing::info!(
                target: "store",
                %cutoff,
                news = report.news_removed.len(),
                summaries = report.summaries_removed.len(),
                "removed expired data"
            );
            self.refresh_latest_news()?;
            self.refresh_latest_summary()?;
        }
        Ok(report)
    }

    /// `latest_limit` newest articles across every dated partition.
    pub fn refresh_latest_news(&self) -> Result<(), PersistenceError> {
        let mut all: Vec<EnrichedArticle> = Vec::new();
        for (_, dir) in partitions(&self.root.join(NEWS), Partition::Dir)?.into_iter().rev() {
            if let Some(articles) = atomic::read_json::<Vec<EnrichedArticle>>(&dir.join("articles.json"))? {
                all.extend(articles);
            }
        }
        all.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        all.truncate(self.latest_limit);
        atomic::write_json(&self.root.join(NEWS).join(LATEST), &all)
    }

    /// Copy of the summary with the greatest date; removed when none remain.
    pub fn refresh_latest_summary(&self) -> Result<(), PersistenceError> {
        let latest = self.root.join(SUMMARIES).join(LATEST);
        let newest = partitions(&self.root.join(SUMMARIES), Partition::File)?.pop();
        match newest {
            Some((_, path)) => match atomic::read_json::<DailySummary>(&path)? {
                Some(summary) => atomic::write_json(&latest, &summary),
                None => Ok(()),
            },
            None => remove(&latest, |p| fs::remove_file(p)),
        }
    }

    pub fn save_processing_metrics(
        &self,
        metrics: &ProcessingMetrics,
    ) -> Result<PathBuf, PersistenceError> {
        let stamp = metrics.end_time.unwrap_or(metrics.start_time);
        let path = self
            .root
            .join(METRICS)
            .join(format!("metrics_{}.json", stamp.format("%Y%m%d_%H%M%S")));
        atomic::write_json(&path, &metrics.report())?;
        Ok(path)
    }

    /// Category list and enabled sources for the frontend filters.
    pub fn save_config_files(&self, sources: &[FeedSource]) -> Result<(), PersistenceError> {
        let dir = self.root.join(CONFIG);
        atomic::write_json(&dir.join("categories.json"), &CATEGORIES)?;
        let enabled: Vec<&FeedSource> = sources.iter().filter(|s| s.enabled).collect();
        atomic::write_json(&dir.join("sources.json"), &enabled)
    }
}

#[derive(Clone, Copy)]
enum Partition {
    Dir,
    File,
}

/// Dated entries of `dir`, oldest first.
fn partitions(dir: &Path, kind: Partition) -> Result<Vec<(NaiveDate, PathBuf)>, PersistenceError> {
    let read_err = |source: io::Error| PersistenceError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(read_err(e)),
    };

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let stem = match kind {
            Partition::Dir if path.is_dir() => name,
            Partition::File if path.is_file() => match name.strip_suffix(".json") {
                Some(stem) => stem,
                None => continue,
            },
            _ => continue,
        };
        if let Ok(date) = NaiveDate::parse_from_str(stem, DATE_FMT) {
            // Reject non-canonical spellings like 2025-1-5.
            if date.format(DATE_FMT).to_string() == stem {
                out.push((date, path));
            }
        }
    }
    out.sort_by_key(|(d, _)| *d);
    Ok(out)
}

fn remove(path: &Path, op: impl FnOnce(&Path) -> io::Result<()>) -> Result<(), PersistenceError> {
    match op(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PersistenceError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}
