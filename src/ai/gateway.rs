// src/ai/gateway.rs
use std::time::Duration;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, timeout, Instant};

use crate::ai::{DynProvider, Operation, ProviderRequest, ProviderResponse};
use crate::error::{ConfigError, ProviderError};
use crate::ingest::types::Language;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("provider_calls_total", "Provider invocations, by provider.");
        describe_counter!(
            "provider_errors_total",
            "Failed provider invocations, by provider and kind."
        );
    });
}

/// Spaces calls to one provider so they never exceed its per-minute budget.
struct Pacer {
    interval: Duration,
    next_free: Mutex<Option<Instant>>,
}

impl Pacer {
    fn per_minute(rpm: u32) -> Self {
        let interval = if rpm == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(60) / rpm
        };
        Self {
            interval,
            next_free: Mutex::new(None),
        }
    }

    /// Reserve the next slot, then sleep until it arrives.
    async fn wait_turn(&self) {
        if self.interval.is_zero() {
            return;
        }
        let slot = {
            let mut next = self.next_free.lock().await;
            let now = Instant::now();
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + self.interval);
            slot
        };
        sleep_until(slot).await;
    }
}

struct Slot {
    provider: DynProvider,
    pacer: Pacer,
}

/// Ordered set of providers (priority order) behind one call surface.
pub struct ProviderGateway {
    slots: Vec<Slot>,
    call_timeout: Duration,
}

impl ProviderGateway {
    pub fn new(providers: Vec<DynProvider>, call_timeout: Duration) -> Result<Self, ConfigError> {
        if providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        ensure_metrics_described();
        let slots = providers
            .into_iter()
            .map(|provider| Slot {
                pacer: Pacer::per_minute(provider.requests_per_minute()),
                provider,
            })
            .collect();
        Ok(Self {
            slots,
            call_timeout,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.provider.name()).collect()
    }

    pub fn provider_name(&self, index: usize) -> &str {
        self.slots
            .get(index)
            .map_or("unknown", |s| s.provider.name())
    }

    pub fn supports(&self, index: usize, operation: Operation) -> bool {
        self.slots
            .get(index)
            .is_some_and(|s| s.provider.capabilities().contains(&operation))
    }

    /// First provider at or after `from` that can serve `operation`.
    pub fn next_supporting(&self, from: usize, operation: Operation) -> Option<usize> {
        (from..self.slots.len()).find(|&i| self.supports(i, operation))
    }

    /// One paced, time-bounded call to the provider at `index`.
    pub async fn call(
        &self,
        index: usize,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let slot = self
            .slots
            .get(index)
            .ok_or_else(|| ProviderError::fatal("gateway", format!("no provider at index {index}")))?;
        let name = slot.provider.name().to_string();

        if !slot.provider.capabilities().contains(&request.operation) {
            return Err(ProviderError::fatal(
                name,
                format!("unsupported operation {}", request.operation.as_str()),
            ));
        }

        slot.pacer.wait_turn().await;
        counter!("provider_calls_total", "provider" => name.clone()).increment(1);

        let result = match timeout(self.call_timeout, slot.provider.invoke(request)).await {
            Ok(Ok(r)) if r.result_text.trim().is_empty() => Err(ProviderError::fatal(
                name.clone(),
                format!("empty {} result", request.operation.as_str()),
            )),
            Ok(r) => r,
            Err(_) => Err(ProviderError::transient(
                name.clone(),
                format!("timed out after {}s", self.call_timeout.as_secs()),
            )),
        };

        if let Err(e) = &result {
            tracing::debug!(target: "ai", provider = %name, error = %e, "provider call failed");
            counter!(
                "provider_errors_total",
                "provider" => name,
                "kind" => format!("{:?}", e.kind())
            )
            .increment(1);
        }
        result
    }

    pub async fn summarize(
        &self,
        index: usize,
        text: &str,
        target_language: Language,
    ) -> Result<ProviderResponse, ProviderError> {
        self.call(index, &ProviderRequest::new(Operation::Summarize, text, target_language))
            .await
    }

    pub async fn translate(
        &self,
        index: usize,
        text: &str,
        target_language: Language,
    ) -> Result<String, ProviderError> {
        self.call(index, &ProviderRequest::new(Operation::Translate, text, target_language))
            .await
            .map(|r| r.result_text)
    }
}
