//! Scripted mock question source.
//!
//! Emulates the remote generation service without any network. Designed for
//! deterministic tests that must not depend on a live endpoint.
//!
//! # Features
//! - Canned batches of well-formed questions
//! - Configurable failures, short responses, and garbage (fails validation)
//! - Hold-until-released responses for race testing
//! - Latency simulation
//! - Records every [`GenerationRequest`] for assertion
//!
//! Outcomes queued with [`MockQuestionSource::with_outcome`] are consumed in
//! order; once the script is exhausted every further call returns a full
//! well-formed batch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};

use crate::errors::GenerationError;
use crate::question::{Difficulty, RawQuestion};
use crate::source::{GenerationRequest, QuestionSource};

/// Describes how the mock should answer one call.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// A full batch of `n` well-formed questions.
    Batch(usize),
    /// `n` well-formed questions (used to provoke the insufficient path).
    Short(usize),
    /// A network failure.
    Fail,
    /// Items that all fail validation.
    Garbage,
    /// Park until [`MockQuestionSource::release`] is called, then return a
    /// full batch.
    HoldUntilReleased,
}

struct Inner {
    script: Mutex<VecDeque<MockOutcome>>,
    requests: Mutex<Vec<GenerationRequest>>,
    calls: AtomicU64,
    call_signal: Notify,
    released: watch::Sender<bool>,
    default_batch_size: Mutex<usize>,
    latency: Mutex<Duration>,
}

/// In-process [`QuestionSource`] double. Cloning shares the same script and
/// recorded history.
#[derive(Clone)]
pub struct MockQuestionSource {
    inner: Arc<Inner>,
}

impl Default for MockQuestionSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockQuestionSource {
    pub fn new() -> Self {
        let (released, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                script: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                calls: AtomicU64::new(0),
                call_signal: Notify::new(),
                released,
                default_batch_size: Mutex::new(10),
                latency: Mutex::new(Duration::ZERO),
            }),
        }
    }

    /// Queue one scripted outcome.
    pub fn with_outcome(self, outcome: MockOutcome) -> Self {
        self.inner.script.lock().push_back(outcome);
        self
    }

    /// Size of the well-formed batch returned once the script is exhausted.
    pub fn with_batches(self, size: usize) -> Self {
        *self.inner.default_batch_size.lock() = size;
        self
    }

    /// Simulated per-call latency.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.inner.latency.lock() = latency;
        self
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> u64 {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` calls have been made.
    pub async fn wait_for_calls(&self, n: u64) {
        loop {
            let notified = self.inner.call_signal.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.calls() >= n {
                return;
            }
            notified.await;
        }
    }

    /// Release every call parked on [`MockOutcome::HoldUntilReleased`].
    pub fn release(&self) {
        self.inner.released.send_replace(true);
    }

    /// Every request received, in call order.
    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.inner.requests.lock().clone()
    }

    fn make_batch(&self, n: usize) -> Vec<RawQuestion> {
        let call = self.calls();
        (0..n).map(|i| well_formed_raw(&format!("c{call}-q{i}"))).collect()
    }
}

#[async_trait]
impl QuestionSource for MockQuestionSource {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<RawQuestion>, GenerationError> {
        self.inner.requests.lock().push(request.clone());
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.call_signal.notify_waiters();

        let latency = *self.inner.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let outcome = self
            .inner
            .script
            .lock()
            .pop_front()
            .unwrap_or(MockOutcome::Batch(*self.inner.default_batch_size.lock()));

        match outcome {
            MockOutcome::Batch(n) => Ok(self.make_batch(n)),
            MockOutcome::Short(n) => Ok(self.make_batch(n)),
            MockOutcome::Fail => Err(GenerationError::Network("mock failure".to_string())),
            MockOutcome::Garbage => Ok(vec![RawQuestion::default(), RawQuestion::default()]),
            MockOutcome::HoldUntilReleased => {
                let mut rx = self.inner.released.subscribe();
                while !*rx.borrow() {
                    if rx.changed().await.is_err() {
                        return Err(GenerationError::Network("mock dropped".to_string()));
                    }
                }
                Ok(self.make_batch(*self.inner.default_batch_size.lock()))
            }
        }
    }
}

/// A well-formed raw question; correct answer is always option `"a"`.
pub fn well_formed_raw(text: &str) -> RawQuestion {
    RawQuestion {
        text: Some(text.to_string()),
        options: Some(vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "d".to_string(),
        ]),
        correct_answer: Some("a".to_string()),
        explanation: Some("explanation".to_string()),
        difficulty: Some(Difficulty::Medium),
        hint: None,
        topic: None,
    }
}

/// Stats sink double that records XP deltas.
#[derive(Clone, Default)]
pub struct RecordingStatsSink {
    deltas: Arc<Mutex<Vec<u32>>>,
}

impl RecordingStatsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deltas(&self) -> Vec<u32> {
        self.deltas.lock().clone()
    }

    pub fn total(&self) -> u32 {
        self.deltas.lock().iter().sum()
    }
}

#[async_trait]
impl crate::session::StatsSink for RecordingStatsSink {
    async fn add_xp(&self, delta: u32) -> anyhow::Result<()> {
        self.deltas.lock().push(delta);
        Ok(())
    }
}
