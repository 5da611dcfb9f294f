//! Session controller: the per-question lifecycle.
//!
//! Presents the current question, records answers and skips as immutable
//! [`AnswerEvent`]s, keeps score/XP, and drives the batch manager. The
//! controller is the sole writer of the event log; the manager only reads
//! it when building performance digests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::batch::{Advance, BatchManager, BatchPhase};
use crate::config::EngineConfig;
use crate::errors::{QuizflowError, SessionError};
use crate::events::{AnswerEvent, EventLog};
use crate::question::{Difficulty, Question};
use crate::source::{QuestionSource, TopicParams};

/// Questions answered/skipped between adaptive cadence checks.
const ADAPTIVE_CADENCE: u64 = 10;
/// Remainder within the cadence at which the refresh fires, so adaptation
/// lands before the 10-question boundary rather than at it.
const ADAPTIVE_CADENCE_POINT: u64 = 8;

/// External stats collaborator: "add XP delta for the active user".
/// Fire-and-forget from the engine's perspective.
#[async_trait]
pub trait StatsSink: Send + Sync {
    async fn add_xp(&self, delta: u32) -> anyhow::Result<()>;
}

/// Result of answering the current question.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub is_correct: bool,
    pub time_spent_seconds: u64,
    pub topic: String,
    pub difficulty: Difficulty,
}

/// Final tallies handed back when the session ends.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub total_questions: u64,
    pub correct_answers: u64,
    pub total_xp: u64,
    pub events: Vec<AnswerEvent>,
    pub batches_completed: u32,
}

/// Read-only projection of session state for the presentation layer.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub question: Option<Question>,
    pub position: usize,
    pub batch_number: u32,
    pub batch_len: usize,
    pub total_questions: u64,
    pub correct_answers: u64,
    pub total_xp: u64,
    /// True while the session is blocked on the next batch.
    pub waiting_for_batch: bool,
    /// True when waiting with a recorded generation failure; the UI should
    /// offer the manual retry action.
    pub retry_available: bool,
    /// Fires exactly once, the first time the session enters adaptive
    /// territory.
    pub adaptive_notice: bool,
}

/// An infinite practice session.
///
/// Owns the batch manager and the append-only event log. All methods are
/// no-ops after [`PracticeSession::dispose`].
pub struct PracticeSession {
    manager: BatchManager,
    events: EventLog,
    stats: Option<Arc<dyn StatsSink>>,
    cfg: EngineConfig,
    total_questions: u64,
    correct_answers: u64,
    total_xp: u64,
    question_started: Instant,
    feedback_shown: bool,
    adaptive_engaged: bool,
    adaptive_notice_pending: bool,
    disposed: bool,
}

impl PracticeSession {
    /// Start a session. With `seed` the first batch is taken as already
    /// validated; otherwise one is generated before this returns.
    pub async fn start(
        source: Arc<dyn QuestionSource>,
        params: TopicParams,
        cfg: EngineConfig,
        seed: Option<Vec<Question>>,
        stats: Option<Arc<dyn StatsSink>>,
    ) -> Result<Self, QuizflowError> {
        let events = EventLog::new();
        let manager = BatchManager::new(source, events.clone(), params, cfg.clone());
        manager.start(seed).await.map_err(QuizflowError::from)?;
        Ok(Self {
            manager,
            events,
            stats,
            cfg,
            total_questions: 0,
            correct_answers: 0,
            total_xp: 0,
            question_started: Instant::now(),
            feedback_shown: false,
            adaptive_engaged: false,
            adaptive_notice_pending: false,
            disposed: false,
        })
    }

    /// The question currently on screen. `None` only after disposal or
    /// before the first batch loads.
    pub fn current_question(&self) -> Option<Question> {
        self.manager.current_question()
    }

    /// Record an answer for the current question. Returns `None` when
    /// feedback is already shown or there is no current question; exactly
    /// one event is appended per question.
    pub fn select_answer(&mut self, choice: &str) -> Option<AnswerOutcome> {
        if self.disposed || self.feedback_shown {
            return None;
        }
        let question = self.manager.current_question()?;
        let time_spent = self.stop_timer();
        let is_correct = choice == question.correct_answer;

        self.record_event(&question, Some(choice.to_string()), is_correct, time_spent, false);

        if is_correct {
            self.correct_answers += 1;
            self.total_xp += u64::from(self.cfg.xp_per_correct);
            self.push_xp(self.cfg.xp_per_correct);
        }

        Some(AnswerOutcome {
            is_correct,
            time_spent_seconds: time_spent,
            topic: question.topic,
            difficulty: question.difficulty,
        })
    }

    /// Skip the current question: bookkept as an incorrect answer with no
    /// selection and no XP.
    pub fn skip_question(&mut self) {
        if self.disposed || self.feedback_shown {
            return;
        }
        let Some(question) = self.manager.current_question() else {
            return;
        };
        let time_spent = self.stop_timer();
        self.record_event(&question, None, false, time_spent, true);
    }

    /// Move to the next question, blocking on the batch manager at batch
    /// boundaries. Resets the per-question timer.
    pub async fn advance(&mut self) -> Result<(), SessionError> {
        if self.disposed {
            return Err(SessionError::Disposed);
        }
        if self.manager.advance_position() == Advance::EndOfBatch {
            self.manager.advance_batch().await?;
        }
        self.feedback_shown = false;
        self.question_started = Instant::now();

        // First adaptive question reaching the screen also counts as
        // entering adaptive territory.
        if !self.adaptive_engaged {
            if let Some(q) = self.manager.current_question() {
                if q.is_adaptive {
                    self.adaptive_engaged = true;
                    self.adaptive_notice_pending = true;
                }
            }
        }
        Ok(())
    }

    /// Manual "retry if stuck" action, surfaced by the UI while waiting.
    pub fn retry_generation(&self) {
        if !self.disposed {
            self.manager.retry_generation();
        }
    }

    /// Freeze the session. Every pending async completion becomes a no-op.
    pub fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.manager.dispose();
        }
    }

    /// Final tallies. Usable at any point, including after disposal.
    pub fn end_session(&self) -> SessionSummary {
        let snap = self.manager.snapshot();
        let finished_current = self.feedback_shown
            && snap.batch_len > 0
            && snap.position + 1 == snap.batch_len;
        SessionSummary {
            total_questions: self.total_questions,
            correct_answers: self.correct_answers,
            total_xp: self.total_xp,
            events: self.events.snapshot(),
            batches_completed: snap.batch_number.saturating_sub(1) + u32::from(finished_current),
        }
    }

    /// Projection for the presentation layer. Consumes the one-shot
    /// adaptive notice.
    pub fn view(&mut self) -> SessionView {
        let snap = self.manager.snapshot();
        let waiting = snap.phase == BatchPhase::WaitingForBatch;
        SessionView {
            question: self.manager.current_question(),
            position: snap.position,
            batch_number: snap.batch_number,
            batch_len: snap.batch_len,
            total_questions: self.total_questions,
            correct_answers: self.correct_answers,
            total_xp: self.total_xp,
            waiting_for_batch: waiting,
            retry_available: waiting && snap.last_error.is_some(),
            adaptive_notice: std::mem::take(&mut self.adaptive_notice_pending),
        }
    }

    fn stop_timer(&self) -> u64 {
        // Rounded, not truncated: 3.5s of thought is 4 seconds spent.
        self.question_started.elapsed().as_secs_f64().round() as u64
    }

    fn record_event(
        &mut self,
        question: &Question,
        selected_answer: Option<String>,
        is_correct: bool,
        time_spent_seconds: u64,
        skipped: bool,
    ) {
        let event = AnswerEvent {
            question_index: self.total_questions,
            topic: question.topic.clone(),
            difficulty: question.difficulty,
            is_correct,
            time_spent_seconds,
            selected_answer,
            correct_answer: question.correct_answer.clone(),
            timestamp: Utc::now(),
            skipped,
            batch_index: question.batch_number,
        };
        self.events.append(event);
        self.total_questions += 1;
        self.feedback_shown = true;

        if !self.adaptive_engaged && self.events.len() >= self.cfg.adaptive_unlock_events {
            self.adaptive_engaged = true;
            self.adaptive_notice_pending = true;
        }

        // Batches and the 10-question adaptive cadence are independent
        // cycles: refreshing here guarantees new performance data reaches
        // generation before the cadence boundary.
        if self.total_questions % ADAPTIVE_CADENCE == ADAPTIVE_CADENCE_POINT {
            debug!(
                total_questions = self.total_questions,
                "adaptive cadence point reached"
            );
            self.manager.force_adaptive_refresh();
        }
    }

    fn push_xp(&self, delta: u32) {
        let Some(sink) = self.stats.as_ref().map(Arc::clone) else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = sink.add_xp(delta).await {
                warn!(error = %e, "stats update failed; answer already recorded");
            }
        });
    }
}
