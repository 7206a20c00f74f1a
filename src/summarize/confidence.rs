// src/summarize/confidence.rs
use std::collections::HashMap;

#[inline]
pub fn clamp01(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Heuristic used when a provider does not report its own confidence.
///
/// `base + ratio_weight · fit + category_bonus`, where `fit` is 1.0 when the
/// summary/source length ratio equals `ideal_ratio` and falls linearly to 0.0
/// as it drifts a full `ideal_ratio` away. The result is always clamped to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidencePolicy {
    pub base: f32,
    pub ideal_ratio: f32,
    pub ratio_weight: f32,
    pub category_bonus: HashMap<String, f32>,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        let category_bonus = [("Claude", 0.1), ("海外", 0.05), ("国内", 0.05), ("Reddit", -0.1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self {
            base: 0.5,
            ideal_ratio: 0.3,
            ratio_weight: 0.3,
            category_bonus,
        }
    }
}

impl ConfidencePolicy {
    pub fn resolve(
        &self,
        reported: Option<f32>,
        summary_chars: usize,
        source_chars: usize,
        category: &str,
    ) -> f32 {
        match reported.filter(|c| c.is_finite()) {
            Some(c) => clamp01(c),
            None => self.heuristic(summary_chars, source_chars, category),
        }
    }

    pub fn heuristic(&self, summary_chars: usize, source_chars: usize, category: &str) -> f32 {
        let ratio = summary_chars as f32 / source_chars.max(1) as f32;
        let ideal = self.ideal_ratio.max(f32::EPSILON);
        let fit = 1.0 - ((ratio - ideal).abs() / ideal).min(1.0);
        let bonus = self.category_bonus.get(category).copied().unwrap_or(0.0);
        clamp01(self.base + self.ratio_weight * fit + bonus)
    }
}
