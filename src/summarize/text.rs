// src/summarize/text.rs
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_TAGS: usize = 5;

/// Trim, then cut to `max_chars` characters ending in `...` when too long.
pub fn truncate_summary(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.truncate(out.trim_end().len());
    out.push_str("...");
    out
}

static LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:和訳|翻訳|日本語訳|訳|translation|translated title|title|タイトル)\s*[:：]\s*",
    )
    .unwrap()
});

/// Strip leading labels and wrapping quotes; keep a single line.
pub fn clean_translation(raw: &str) -> String {
    let lines: Vec<String> = raw
        .lines()
        .map(|l| LABEL.replace(l, "").trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    let joined = match lines.as_slice() {
        [] => String::new(),
        [first, rest @ ..] if rest.iter().all(|l| l == first) => first.clone(),
        many => many.join(" "),
    };

    let trimmed = joined.trim();
    let unquoted = trimmed
        .strip_prefix('「')
        .and_then(|s| s.strip_suffix('」'))
        .or_else(|| trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

/// Trim, drop `#`, dedupe case-insensitively, cap at [`MAX_TAGS`].
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .take(MAX_TAGS)
        .collect()
}
