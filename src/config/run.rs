// src/config/run.rs
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;

use crate::config::providers::{apply_priority, load_provider_specs, specs_from_env, ProviderSpec};
use crate::error::ConfigError;
use crate::ingest::types::Language;
use crate::ingest::CollectorConfig;
use crate::summarize::retry::RetryPolicy;
use crate::summarize::EngineConfig;

const DEFAULT_PROVIDERS_PATH: &str = "config/providers.toml";

/// Everything a run needs, resolved once at startup and passed by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub output_path: PathBuf,
    pub retention_days: u32,
    pub batch_size: usize,
    /// Attempts per provider before falling back to the next one.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub max_backoff: Duration,
    pub batch_delay: Duration,
    pub display_language: Language,
    pub feed_timeout: Duration,
    pub feed_max_retries: u32,
    pub per_host_concurrency: usize,
    pub provider_timeout: Duration,
    pub latest_limit: usize,
    pub max_summary_chars: usize,
    pub max_article_age_hours: Option<u64>,
    pub skip_existing: bool,
    /// Overrides the local calendar date used for partitioning.
    pub run_date: Option<NaiveDate>,
    pub providers: Vec<ProviderSpec>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("frontend/public/data"),
            retention_days: 30,
            batch_size: 5,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(1000),
            max_backoff: Duration::from_secs(30),
            batch_delay: Duration::ZERO,
            display_language: Language::Ja,
            feed_timeout: Duration::from_secs(30),
            feed_max_retries: 2,
            per_host_concurrency: 2,
            provider_timeout: Duration::from_secs(60),
            latest_limit: 100,
            max_summary_chars: 200,
            max_article_age_hours: None,
            skip_existing: false,
            run_date: None,
            providers: Vec::new(),
        }
    }
}

impl RunConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(env: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = Self::default();
        let get = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let batch_size = parse_or(&get, "BATCH_SIZE", d.batch_size)?;
        if batch_size == 0 {
            return Err(ConfigError::invalid("BATCH_SIZE", "0"));
        }
        let max_summary_chars = parse_or(&get, "MAX_SUMMARY_CHARS", d.max_summary_chars)?;
        if max_summary_chars < 4 {
            return Err(ConfigError::invalid(
                "MAX_SUMMARY_CHARS",
                &max_summary_chars.to_string(),
            ));
        }

        let display_language = match get("DISPLAY_LANGUAGE") {
            Some(v) => v
                .parse::<Language>()
                .map_err(|_| ConfigError::invalid("DISPLAY_LANGUAGE", &v))?,
            None => d.display_language,
        };

        let run_date = match get("RUN_DATE") {
            Some(v) => Some(
                NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                    .map_err(|_| ConfigError::invalid("RUN_DATE", &v))?,
            ),
            None => None,
        };

        let providers = resolve_providers(env, &get)?;

        Ok(Self {
            output_path: get("OUTPUT_PATH").map(PathBuf::from).unwrap_or(d.output_path),
            retention_days: parse_or(&get, "RETENTION_DAYS", d.retention_days)?,
            batch_size,
            max_retries: parse_or(&get, "MAX_RETRIES", d.max_retries)?,
            retry_base_delay: Duration::from_millis(parse_or(&get, "RETRY_DELAY_MS", 1000u64)?),
            max_backoff: Duration::from_secs(parse_or(&get, "MAX_BACKOFF_SECS", 30u64)?),
            batch_delay: Duration::from_millis(parse_or(&get, "BATCH_DELAY_MS", 0u64)?),
            display_language,
            feed_timeout: Duration::from_secs(parse_or(&get, "FEED_TIMEOUT_SECS", 30u64)?),
            feed_max_retries: parse_or(&get, "FEED_MAX_RETRIES", d.feed_max_retries)?,
            per_host_concurrency: parse_or(&get, "PER_HOST_CONCURRENCY", d.per_host_concurrency)?,
            provider_timeout: Duration::from_secs(parse_or(&get, "PROVIDER_TIMEOUT_SECS", 60u64)?),
            latest_limit: parse_or(&get, "LATEST_LIMIT", d.latest_limit)?,
            max_summary_chars,
            max_article_age_hours: match get("MAX_ARTICLE_AGE_HOURS") {
                Some(v) => Some(
                    v.parse()
                        .map_err(|_| ConfigError::invalid("MAX_ARTICLE_AGE_HOURS", &v))?,
                ),
                None => None,
            },
            skip_existing: parse_flag(&get, "SKIP_EXISTING")?,
            run_date,
            providers,
        })
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            fetch_timeout: self.feed_timeout,
            max_retries: self.feed_max_retries,
            retry_base_delay: self.retry_base_delay,
            per_host_concurrency: self.per_host_concurrency,
            max_article_age: self
                .max_article_age_hours
                .and_then(|h| chrono::Duration::try_hours(h as i64)),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.retry_base_delay,
            max_delay: self.max_backoff,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            batch_size: self.batch_size,
            display_language: self.display_language,
            max_summary_chars: self.max_summary_chars,
            batch_delay: self.batch_delay,
        }
    }
}

fn parse_or<T: FromStr>(
    get: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(v) => v.parse().map_err(|_| ConfigError::invalid(key, &v)),
        None => Ok(default),
    }
}

fn parse_flag(get: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<bool, ConfigError> {
    match get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(key, &v)),
        },
    }
}

/// `PROVIDERS_PATH` (must exist), else `config/providers.toml` when present,
/// else the well-known API key variables. `PROVIDER_PRIORITY` reorders the result.
fn resolve_providers(
    env: &dyn Fn(&str) -> Option<String>,
    get: &dyn Fn(&str) -> Option<String>,
) -> Result<Vec<ProviderSpec>, ConfigError> {
    let from_file = |path: &Path| {
        load_provider_specs(path, env).map_err(|e| ConfigError::File {
            path: path.to_path_buf(),
            message: format!("{e:#}"),
        })
    };

    let specs = match get("PROVIDERS_PATH").map(PathBuf::from) {
        Some(path) if path.exists() => from_file(&path)?,
        Some(path) => {
            return Err(ConfigError::File {
                path,
                message: "PROVIDERS_PATH points to non-existent path".to_string(),
            })
        }
        None if Path::new(DEFAULT_PROVIDERS_PATH).exists() => {
            from_file(Path::new(DEFAULT_PROVIDERS_PATH))?
        }
        None => specs_from_env(env),
    };

    Ok(match get("PROVIDER_PRIORITY") {
        Some(order) => apply_priority(specs, &order),
        None => specs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = RunConfig::from_lookup(&lookup(&[])).unwrap();
        assert_eq!(cfg.batch_size, 5);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.retention_days, 30);
        assert_eq!(cfg.display_language, Language::Ja);
        assert_eq!(cfg.output_path, PathBuf::from("frontend/public/data"));
        assert!(!cfg.skip_existing);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = RunConfig::from_lookup(&lookup(&[
            ("BATCH_SIZE", "8"),
            ("RETRY_DELAY_MS", "250"),
            ("DISPLAY_LANGUAGE", "en"),
            ("SKIP_EXISTING", "yes"),
            ("RUN_DATE", "2025-02-03"),
            ("MAX_ARTICLE_AGE_HOURS", "48"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();
        assert_eq!(cfg.batch_size, 8);
        assert_eq!(cfg.retry_base_delay, Duration::from_millis(250));
        assert_eq!(cfg.display_language, Language::En);
        assert!(cfg.skip_existing);
        assert_eq!(cfg.run_date, NaiveDate::from_ymd_opt(2025, 2, 3));
        assert_eq!(cfg.providers.len(), 1);
        assert_eq!(
            cfg.collector_config().max_article_age,
            chrono::Duration::try_hours(48)
        );
        assert_eq!(cfg.retry_policy().base_delay, Duration::from_millis(250));
    }

    #[test]
    fn invalid_numbers_are_config_errors() {
        let err = RunConfig::from_lookup(&lookup(&[("BATCH_SIZE", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BATCH_SIZE"));
        assert!(RunConfig::from_lookup(&lookup(&[("BATCH_SIZE", "0")])).is_err());
        assert!(RunConfig::from_lookup(&lookup(&[("SKIP_EXISTING", "maybe")])).is_err());
        assert!(RunConfig::from_lookup(&lookup(&[("DISPLAY_LANGUAGE", "fr")])).is_err());
    }

    #[test]
    fn missing_providers_file_is_an_error() {
        let err = RunConfig::from_lookup(&lookup(&[("PROVIDERS_PATH", "/definitely/not/here.toml")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::File { .. }));
    }
}
