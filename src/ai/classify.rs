// src/ai/classify.rs
//! Maps HTTP statuses and error messages onto [`ErrorKind`].

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ErrorKind, ProviderError};

static RATE_LIMIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)rate.?limit|too many requests|quota|insufficient.?credits|credit balance")
        .unwrap()
});

static TRANSIENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)time.?out|timed out|connection|network|service unavailable|bad gateway|internal server error|overloaded|temporarily",
    )
    .unwrap()
});

pub fn classify_status(status: u16, body: &str) -> ErrorKind {
    match status {
        429 => ErrorKind::RateLimited,
        408 | 500..=599 => ErrorKind::Transient,
        400 | 401 | 403 | 404 => match classify_message(body) {
            // quota exhaustion is sometimes reported as 400/403
            ErrorKind::RateLimited => ErrorKind::RateLimited,
            _ => ErrorKind::Fatal,
        },
        _ => classify_message(body),
    }
}

pub fn classify_message(message: &str) -> ErrorKind {
    if RATE_LIMIT.is_match(message) {
        ErrorKind::RateLimited
    } else if TRANSIENT.is_match(message) {
        ErrorKind::Transient
    } else {
        ErrorKind::Fatal
    }
}

/// Upper bound on a server-supplied `Retry-After`.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// `Retry-After` in delta-seconds form, capped at [`MAX_RETRY_AFTER`].
/// HTTP-date values are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let delay = Duration::try_from_secs_f64(secs).unwrap_or(MAX_RETRY_AFTER);
    Some(delay.min(MAX_RETRY_AFTER))
}

pub fn to_error(
    provider: &str,
    kind: ErrorKind,
    message: impl Into<String>,
    retry_after: Option<Duration>,
) -> ProviderError {
    match kind {
        ErrorKind::RateLimited => ProviderError::rate_limited(provider, retry_after),
        ErrorKind::Transient => ProviderError::transient(provider, message),
        ErrorKind::Fatal => ProviderError::fatal(provider, message),
    }
}
