// src/metrics.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-run counters. Accumulated in memory and flushed once at the end of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub articles_collected: usize,
    pub articles_processed: usize,
    pub articles_failed: usize,
    pub api_calls_made: u64,
    pub errors: Vec<String>,
}

impl ProcessingMetrics {
    pub fn start(at: DateTime<Utc>) -> Self {
        Self {
            start_time: at,
            end_time: None,
            articles_collected: 0,
            articles_processed: 0,
            articles_failed: 0,
            api_calls_made: 0,
            errors: Vec::new(),
        }
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.end_time = Some(at);
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1_000.0)
    }

    /// processed / max(collected, 1)
    pub fn success_rate(&self) -> f64 {
        self.articles_processed as f64 / self.articles_collected.max(1) as f64
    }

    /// Serializable view with the derived fields.
    pub fn report(&self) -> MetricsReport<'_> {
        MetricsReport {
            metrics: self,
            duration_seconds: self.duration_seconds(),
            success_rate: self.success_rate(),
            error_count: self.errors.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsReport<'a> {
    #[serde(flatten)]
    pub metrics: &'a ProcessingMetrics,
    pub duration_seconds: Option<f64>,
    pub success_rate: f64,
    pub error_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn derived_fields() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut m = ProcessingMetrics::start(start);
        assert_eq!(m.success_rate(), 0.0);
        m.articles_collected = 4;
        m.articles_processed = 3;
        m.record_error("x");
        m.finish(start + chrono::Duration::milliseconds(2500));

        let v = serde_json::to_value(m.report()).unwrap();
        assert_eq!(v["duration_seconds"], 2.5);
        assert_eq!(v["success_rate"], 0.75);
        assert_eq!(v["error_count"], 1);
        assert_eq!(v["articles_collected"], 4);
    }
}
