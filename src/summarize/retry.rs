// src/summarize/retry.rs
//! Retry/fallback state machine shared by the engine and the aggregator.
//!
//! Per request: attempt the current provider; `RateLimited`/`Transient` retry the
//! same provider with exponential backoff until `max_retries` attempts are used,
//! then fall back to the next provider with a fresh counter. `Fatal` falls back
//! immediately. Past the last provider the request is exhausted.

use std::time::Duration;

use crate::ai::{ProviderGateway, ProviderRequest, ProviderResponse};
use crate::error::{ErrorKind, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per provider (3 => at most 3 calls before falling back).
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Retry { delay: Duration },
    FallBack { next: usize },
    Exhausted,
}

impl RetryPolicy {
    /// `attempt` is zero-based within the current provider.
    pub fn decide(
        &self,
        kind: ErrorKind,
        attempt: u32,
        provider_index: usize,
        provider_count: usize,
    ) -> Step {
        let retryable = matches!(kind, ErrorKind::RateLimited | ErrorKind::Transient);
        if retryable && attempt + 1 < self.max_retries.max(1) {
            return Step::Retry {
                delay: self.backoff(attempt),
            };
        }
        if provider_index + 1 < provider_count {
            Step::FallBack {
                next: provider_index + 1,
            }
        } else {
            Step::Exhausted
        }
    }

    /// `base · 2^attempt`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay)
    }

    /// A `Retry-After` hint raises the delay, still within the cap.
    fn with_hint(&self, delay: Duration, hint: Option<Duration>) -> Duration {
        hint.map_or(delay, |h| delay.max(h)).min(self.max_delay)
    }

    /// Drive `request` through the provider chain.
    pub async fn execute(&self, gateway: &ProviderGateway, request: &ProviderRequest) -> Attempted {
        let op = request.operation;
        let mut attempts = 0u32;
        let mut last_error = None;
        let mut current = gateway.next_supporting(0, op);
        let mut attempt = 0u32;

        while let Some(index) = current {
            attempts += 1;
            let error = match gateway.call(index, request).await {
                Ok(response) => {
                    return Attempted {
                        result: Ok(Served {
                            provider: index,
                            response,
                        }),
                        attempts,
                    }
                }
                Err(e) => e,
            };

            match self.decide(error.kind(), attempt, index, gateway.len()) {
                Step::Retry { delay } => {
                    let delay = self.with_hint(delay, error.retry_after());
                    tracing::debug!(
                        target: "ai",
                        provider = error.provider(),
                        attempt,
                        ?delay,
                        error = %error,
                        "retrying provider"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Step::FallBack { next } => {
                    tracing::warn!(
                        target: "ai",
                        provider = error.provider(),
                        error = %error,
                        "falling back to next provider"
                    );
                    current = gateway.next_supporting(next, op);
                    attempt = 0;
                }
                Step::Exhausted => current = None,
            }
            last_error = Some(error);
        }

        let error = last_error.unwrap_or_else(|| {
            ProviderError::fatal("gateway", format!("no provider supports {}", op.as_str()))
        });
        Attempted {
            result: Err(error),
            attempts,
        }
    }
}

/// Successful call plus the index of the provider that served it.
#[derive(Debug, Clone, PartialEq)]
pub struct Served {
    pub provider: usize,
    pub response: ProviderResponse,
}

/// Outcome of a chain run, with the number of provider calls it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted {
    pub result: Result<Served, ProviderError>,
    pub attempts: u32,
}
