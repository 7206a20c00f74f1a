// src/ai/mock.rs
//! Offline providers: a deterministic mock for `AI_TEST_MODE=mock` runs and a
//! scripted provider for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::ai::{Operation, Provider, ProviderRequest, ProviderResponse};
use crate::error::ProviderError;

/// Deterministic, network-free provider.
pub struct MockProvider {
    name: String,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("mock")
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let text = request.input_text.trim();
        let reply = match request.operation {
            Operation::Summarize => {
                let head: String = text.chars().take(120).collect();
                ProviderResponse {
                    result_text: format!("(mock) {}", head.replace('\n', " ")),
                    confidence: None,
                    tags: vec!["mock".to_string()],
                }
            }
            Operation::Translate => {
                ProviderResponse::text(format!("[{}] {}", request.target_language, text))
            }
            Operation::ExtractTrends => ProviderResponse::text(
                text.lines()
                    .filter(|l| !l.trim().is_empty())
                    .take(3)
                    .map(|l| format!("- {}", l.trim()))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
        };
        Ok(reply)
    }
}

type Reply = Result<ProviderResponse, ProviderError>;
type Responder = Box<dyn Fn(&ProviderRequest) -> Reply + Send + Sync>;

/// Replays queued replies, then falls back to a responder function.
pub struct ScriptedProvider {
    name: String,
    rpm: u32,
    capabilities: Vec<Operation>,
    latency: Duration,
    script: Mutex<VecDeque<Reply>>,
    responder: Responder,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    seen: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn from_fn(
        name: impl Into<String>,
        responder: impl Fn(&ProviderRequest) -> Reply + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            rpm: 0,
            capabilities: Operation::ALL.to_vec(),
            latency: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn always_ok(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self::from_fn(name, move |_| Ok(ProviderResponse::text(text.clone())))
    }

    pub fn always_err(name: impl Into<String>, error: ProviderError) -> Self {
        Self::from_fn(name, move |_| Err(error.clone()))
    }

    /// Queue a reply served before the responder is consulted.
    pub fn then(self, reply: Reply) -> Self {
        lock(&self.script).push_back(reply);
        self
    }

    pub fn with_rpm(mut self, rpm: u32) -> Self {
        self.rpm = rpm;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<Operation>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most invocations observed running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        lock(&self.seen).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[Operation] {
        &self.capabilities
    }

    fn requests_per_minute(&self) -> u32 {
        self.rpm
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        lock(&self.seen).push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let queued = lock(&self.script).pop_front();
        match queued {
            Some(reply) => reply,
            None => (self.responder)(request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Language;

    #[tokio::test]
    async fn script_then_responder() {
        let p = ScriptedProvider::always_ok("s", "fine")
            .then(Err(ProviderError::transient("s", "blip")));
        let req = ProviderRequest::new(Operation::Summarize, "x", Language::En);
        assert!(p.invoke(&req).await.is_err());
        assert_eq!(p.invoke(&req).await.unwrap().result_text, "fine");
        assert_eq!(p.calls(), 2);
    }

    #[tokio::test]
    async fn mock_is_deterministic() {
        let m = MockProvider::default();
        let req = ProviderRequest::new(Operation::Translate, "Hello", Language::Ja);
        assert_eq!(m.invoke(&req).await.unwrap().result_text, "[ja] Hello");
        let trends = ProviderRequest::new(Operation::ExtractTrends, "a\n\nb", Language::Ja);
        assert_eq!(m.invoke(&trends).await.unwrap().result_text, "- a\n- b");
    }
}
