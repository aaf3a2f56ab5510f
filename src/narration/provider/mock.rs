//! Mock synthesis backend for testing.
//!
//! Writes the input text itself as the "audio" bytes, so a merged file can
//! be checked by reading it back.  Latency, failures and empty output can
//! be injected per text, which lets tests force any completion order.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::time::sleep;

use crate::narration::provider::SynthesisClient;
use crate::narration::voice::Voice;

/// Configuration for [`MockSynthesisClient`].
#[derive(Debug, Clone, Default)]
pub struct MockSynthesisConfig {
    /// Latency applied to every call without a per-text override.
    pub latency: Duration,
    pub latency_by_text: HashMap<String, Duration>,
    pub fail_on: HashSet<String>,
    pub empty_on: HashSet<String>,
    /// Texts whose synthesis never completes.
    pub hang_on: HashSet<String>,
}

/// Mock backend with deterministic output and call bookkeeping.
#[derive(Default)]
pub struct MockSynthesisClient {
    config: MockSynthesisConfig,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed: Mutex<Vec<String>>,
}

/// Decrements the in-flight counter even when the call is cancelled.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockSynthesisClient {
    pub fn new(config: MockSynthesisConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Set simulated synthesis latency for every call.
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.config.latency = Duration::from_millis(ms);
        self
    }

    /// Override latency for one (sanitized) text.
    pub fn with_delay_for(mut self, text: &str, delay: Duration) -> Self {
        self.config
            .latency_by_text
            .insert(text.to_string(), delay);
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.config.fail_on.insert(text.to_string());
        self
    }

    pub fn empty_output_on(mut self, text: &str) -> Self {
        self.config.empty_on.insert(text.to_string());
        self
    }

    pub fn hanging_on(mut self, text: &str) -> Self {
        self.config.hang_on.insert(text.to_string());
        self
    }

    /// Number of `synthesize` calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Texts of successful calls, in completion order.
    pub fn completion_order(&self) -> Vec<String> {
        self.completed
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SynthesisClient for MockSynthesisClient {
    async fn synthesize(&self, text: &str, _voice: Voice, destination: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if self.config.hang_on.contains(text) {
            std::future::pending::<()>().await;
        }

        let latency = self
            .config
            .latency_by_text
            .get(text)
            .copied()
            .unwrap_or(self.config.latency);
        if !latency.is_zero() {
            sleep(latency).await;
        }

        if self.config.fail_on.contains(text) {
            bail!("mock backend rejected '{}'", text);
        }

        let body: &[u8] = if self.config.empty_on.contains(text) {
            &[]
        } else {
            text.as_bytes()
        };
        tokio::fs::write(destination, body)
            .await
            .with_context(|| format!("failed to write {}", destination.display()))?;

        if let Ok(mut guard) = self.completed.lock() {
            guard.push(text.to_string());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_text_as_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        let client = MockSynthesisClient::default();
        client.synthesize("hello", Voice::default(), &path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        assert_eq!(client.calls(), 1);
        assert_eq!(client.completion_order(), vec!["hello"]);
    }

    #[tokio::test]
    async fn injected_failure() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockSynthesisClient::default().failing_on("bad");
        let err = client
            .synthesize("bad", Voice::default(), &dir.path().join("a.mp3"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rejected"));
        assert!(client.completion_order().is_empty());
    }

    #[tokio::test]
    async fn empty_output_writes_zero_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        let client = MockSynthesisClient::default().empty_output_on("quiet");
        client.synthesize("quiet", Voice::default(), &path).await.unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn in_flight_released_after_call() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockSynthesisClient::default().with_latency(5);
        client
            .synthesize("x", Voice::default(), &dir.path().join("a.mp3"))
            .await
            .unwrap();
        assert_eq!(client.max_in_flight(), 1);
        assert_eq!(client.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hanging_call_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockSynthesisClient::default().hanging_on("stuck");
        let path = dir.path().join("a.mp3");
        let result = tokio::time::timeout(
            Duration::from_millis(20),
            client.synthesize("stuck", Voice::default(), &path),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(client.in_flight.load(Ordering::SeqCst), 0);
    }
}
