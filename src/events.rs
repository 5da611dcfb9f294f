use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::question::Difficulty;

/// Immutable record of one answered or skipped question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerEvent {
    /// Monotonic counter across the whole session.
    pub question_index: u64,
    pub topic: String,
    pub difficulty: Difficulty,
    /// False for skips.
    pub is_correct: bool,
    pub time_spent_seconds: u64,
    pub selected_answer: Option<String>,
    pub correct_answer: String,
    pub timestamp: DateTime<Utc>,
    pub skipped: bool,
    pub batch_index: u32,
}

/// Append-only log of answer events, shared between the session controller
/// (sole writer) and the batch manager (reader, for digests).
///
/// Events are never mutated or removed for the lifetime of the session.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    inner: Arc<RwLock<Vec<AnswerEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, event: AnswerEvent) {
        self.inner.write().push(event);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Snapshot of the full log, in append order.
    pub fn snapshot(&self) -> Vec<AnswerEvent> {
        self.inner.read().clone()
    }
}
