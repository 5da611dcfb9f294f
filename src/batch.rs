//! Batch manager: owns the current batch, the single-slot next-batch cache,
//! and every in-flight generation attempt.
//!
//! All state is instance-scoped; concurrent sessions never share anything.
//! Locks are never held across an await. Async completions are gated on an
//! attempt token plus the phase, so a stale retry or a post-disposal
//! completion is positively identified and dropped instead of racing.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::analyzer::{analyze, AnalyzerProfile};
use crate::config::EngineConfig;
use crate::errors::{GenerationError, SessionError};
use crate::events::EventLog;
use crate::question::Question;
use crate::source::{GenerationMode, GenerationRequest, QuestionSource, TopicParams};
use crate::validator::validate;

/// An ordered group of validated questions served together.
#[derive(Debug, Clone)]
pub struct Batch {
    /// 1-based, strictly increasing and contiguous within a session.
    pub number: u32,
    pub questions: Vec<Question>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Lifecycle phase of the manager. One authoritative enum; every async
/// completion matches on it rather than consulting scattered flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    /// Constructed, not yet seeded with a first batch.
    Idle,
    /// Serving questions from the current batch.
    Serving,
    /// Serving, with a background preload of the next batch in flight.
    PreloadPending,
    /// Current batch exhausted and no next batch ready; the consumer is
    /// blocked until one lands.
    WaitingForBatch,
    /// Swapping the ready next batch in.
    LoadingNextBatch,
    /// Terminal. Every pending completion becomes a no-op.
    Disposed,
}

/// The single-slot next-batch cache.
#[derive(Debug)]
enum NextBatchSlot {
    Empty,
    /// A generation attempt is in flight (initial or retrying).
    Pending,
    Ready(Batch),
}

impl NextBatchSlot {
    fn is_empty(&self) -> bool {
        matches!(self, NextBatchSlot::Empty)
    }

    fn is_ready(&self) -> bool {
        matches!(self, NextBatchSlot::Ready(_))
    }
}

/// Outcome of advancing the position within the current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the next question in the same batch.
    Advanced,
    /// The batch is exhausted; the caller must run the end-of-batch
    /// transition ([`BatchManager::advance_batch`]).
    EndOfBatch,
}

struct ManagerState {
    phase: BatchPhase,
    batch: Batch,
    position: usize,
    slot: NextBatchSlot,
    /// Token of the authoritative in-flight attempt; 0 when none.
    attempt: u64,
    attempt_seq: u64,
    task: Option<JoinHandle<()>>,
    /// Most recent generation failure, for the UI's "retry if stuck" hint.
    last_error: Option<String>,
}

struct Shared {
    state: Mutex<ManagerState>,
    /// Signalled whenever the slot or phase changes in a way a blocked
    /// consumer cares about.
    notify: Notify,
    source: Arc<dyn QuestionSource>,
    events: EventLog,
    params: TopicParams,
    cfg: EngineConfig,
}

/// Coordinates batch serving and preloading for one session.
///
/// Cheap to clone internally via `Arc`; the session controller owns the only
/// public handle. Must be used within a tokio runtime (preloads are spawned
/// tasks).
pub struct BatchManager {
    shared: Arc<Shared>,
}

/// Read-only snapshot for the UI projection.
#[derive(Debug, Clone)]
pub struct BatchSnapshot {
    pub phase: BatchPhase,
    pub position: usize,
    pub batch_number: u32,
    pub batch_len: usize,
    pub last_error: Option<String>,
}

impl BatchManager {
    pub fn new(
        source: Arc<dyn QuestionSource>,
        events: EventLog,
        params: TopicParams,
        cfg: EngineConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ManagerState {
                    phase: BatchPhase::Idle,
                    batch: Batch {
                        number: 0,
                        questions: Vec::new(),
                    },
                    position: 0,
                    slot: NextBatchSlot::Empty,
                    attempt: 0,
                    attempt_seq: 0,
                    task: None,
                    last_error: None,
                }),
                notify: Notify::new(),
                source,
                events,
                params,
                cfg,
            }),
        }
    }

    /// Seed the first batch and start serving.
    ///
    /// With `seed` the questions are taken as already validated; otherwise a
    /// practice batch is generated on demand (with the insufficient-count
    /// fallback, surfaced fatally if that also fails).
    pub async fn start(&self, seed: Option<Vec<Question>>) -> Result<(), GenerationError> {
        let first = match seed {
            Some(questions) => Batch {
                number: 1,
                questions,
            },
            None => {
                one_shot_generate(
                    self.shared.source.as_ref(),
                    &self.shared.params,
                    &self.shared.cfg,
                    GenerationMode::Practice,
                    1,
                )
                .await?
            }
        };

        let mut s = self.shared.state.lock();
        if s.phase != BatchPhase::Idle {
            return Ok(());
        }
        info!(batch_number = first.number, len = first.len(), "session seeded");
        s.batch = first;
        s.position = 0;
        s.phase = BatchPhase::Serving;
        Ok(())
    }

    /// The question at the current position, if serving.
    pub fn current_question(&self) -> Option<Question> {
        let s = self.shared.state.lock();
        match s.phase {
            BatchPhase::Idle | BatchPhase::Disposed => None,
            _ => s.batch.questions.get(s.position).cloned(),
        }
    }

    /// Move to the next question within the current batch, firing the
    /// preload trigger when the new position reaches the configured index.
    pub fn advance_position(&self) -> Advance {
        let (advance, should_preload) = {
            let mut s = self.shared.state.lock();
            if s.phase == BatchPhase::Disposed {
                return Advance::EndOfBatch;
            }
            if s.position + 1 >= s.batch.len() {
                (Advance::EndOfBatch, false)
            } else {
                s.position += 1;
                let trigger = s.position >= self.shared.cfg.preload_trigger_index
                    && s.slot.is_empty()
                    && s.attempt == 0;
                (Advance::Advanced, trigger)
            }
        };
        if should_preload {
            self.spawn_preload();
        }
        advance
    }

    /// End-of-batch transition: swap in the ready next batch, or block until
    /// one lands. Starts an emergency generation if nothing is in flight.
    ///
    /// Late preload completions arriving while we wait still count; only
    /// post-disposal completions are dropped.
    pub async fn advance_batch(&self) -> Result<(), SessionError> {
        enum Step {
            Swap,
            Wait { start_emergency: bool },
        }

        loop {
            // Arm the waiter before inspecting state, so a completion that
            // lands in between still wakes us.
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let step = {
                let mut s = self.shared.state.lock();
                match s.phase {
                    BatchPhase::Disposed => return Err(SessionError::Disposed),
                    BatchPhase::Idle => return Err(SessionError::NoActiveQuestion),
                    _ => {}
                }
                if s.slot.is_ready() {
                    s.phase = BatchPhase::LoadingNextBatch;
                    Step::Swap
                } else {
                    s.phase = BatchPhase::WaitingForBatch;
                    Step::Wait {
                        start_emergency: s.slot.is_empty(),
                    }
                }
            };

            match step {
                Step::Swap => {
                    // UX smoothing only; correctness never depends on it.
                    let delay = self.shared.cfg.timing.swap_delay();
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let mut s = self.shared.state.lock();
                    if s.phase == BatchPhase::Disposed {
                        return Err(SessionError::Disposed);
                    }
                    if let NextBatchSlot::Ready(batch) =
                        mem::replace(&mut s.slot, NextBatchSlot::Empty)
                    {
                        info!(batch_number = batch.number, "swapping in next batch");
                        s.batch = batch;
                        s.position = 0;
                        s.phase = BatchPhase::Serving;
                        return Ok(());
                    }
                    // Slot was cleared under us (manual retry won); wait for
                    // the new attempt instead.
                    s.phase = BatchPhase::WaitingForBatch;
                }
                Step::Wait { start_emergency } => {
                    if start_emergency {
                        debug!("emergency generation: batch exhausted with empty slot");
                        self.spawn_preload();
                    }
                    notified.await;
                }
            }
        }
    }

    /// Manual "retry if stuck": drop any cached or in-flight outcome and
    /// restart the preload unconditionally.
    pub fn retry_generation(&self) {
        info!("manual retry requested");
        self.force_refresh();
    }

    /// Discard a stale next-batch cache and re-trigger a fresh preload, even
    /// if one is already in flight. Used by the adaptive cadence so that new
    /// performance data reaches generation before the batch boundary.
    pub fn force_adaptive_refresh(&self) {
        debug!("adaptive refresh: discarding cached next batch");
        self.force_refresh();
    }

    fn force_refresh(&self) {
        {
            let mut s = self.shared.state.lock();
            if s.phase == BatchPhase::Disposed {
                return;
            }
            s.slot = NextBatchSlot::Empty;
            s.attempt = 0;
            if let Some(task) = s.task.take() {
                task.abort();
            }
            if s.phase == BatchPhase::PreloadPending {
                s.phase = BatchPhase::Serving;
            }
        }
        self.spawn_preload();
    }

    /// Tear down. All pending completions and timers become no-ops; the
    /// in-flight task is aborted eagerly.
    pub fn dispose(&self) {
        let task = {
            let mut s = self.shared.state.lock();
            if s.phase == BatchPhase::Disposed {
                return;
            }
            info!(batch_number = s.batch.number, "batch manager disposed");
            s.phase = BatchPhase::Disposed;
            s.slot = NextBatchSlot::Empty;
            s.attempt = 0;
            s.task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
        self.shared.notify.notify_waiters();
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        let s = self.shared.state.lock();
        BatchSnapshot {
            phase: s.phase,
            position: s.position,
            batch_number: s.batch.number,
            batch_len: s.batch.len(),
            last_error: s.last_error.clone(),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().phase == BatchPhase::Disposed
    }

    /// Start a background generation of the next batch. No-op when one is
    /// already in flight or a batch is already cached: at most one preload
    /// exists per session at any time.
    fn spawn_preload(&self) {
        let (token, next_number) = {
            let mut s = self.shared.state.lock();
            if s.phase == BatchPhase::Disposed || !s.slot.is_empty() || s.attempt != 0 {
                return;
            }
            s.attempt_seq += 1;
            s.attempt = s.attempt_seq;
            s.slot = NextBatchSlot::Pending;
            if s.phase == BatchPhase::Serving {
                s.phase = BatchPhase::PreloadPending;
            }
            (s.attempt, s.batch.number + 1)
        };

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(preload_loop(shared, token, next_number));
        let mut s = self.shared.state.lock();
        // Guard against dispose racing the spawn.
        if s.phase == BatchPhase::Disposed || s.attempt != token {
            handle.abort();
        } else {
            s.task = Some(handle);
        }
    }
}

/// Generation loop for one preload attempt chain. Retries indefinitely with
/// randomized backoff until it succeeds, is superseded (token mismatch), or
/// the manager is disposed.
async fn preload_loop(shared: Arc<Shared>, token: u64, next_number: u32) {
    loop {
        // A fresh digest per attempt: the log may have grown during backoff.
        let digest = analyze(&shared.events.snapshot(), &AnalyzerProfile::PRELOAD);
        let adaptive = digest.is_some();
        let request = GenerationRequest {
            params: shared.params.clone(),
            count: shared.cfg.practice_batch_size,
            set_count: next_number,
            mode: GenerationMode::Practice,
            performance: digest,
        };

        debug!(set_count = next_number, adaptive, "preload attempt");
        let outcome = shared
            .source
            .generate(&request)
            .await
            .map(|raw| validate(raw, next_number, adaptive));

        let failure = {
            let mut s = shared.state.lock();
            if s.phase == BatchPhase::Disposed || s.attempt != token {
                // Superseded or torn down; drop silently.
                return;
            }
            match outcome {
                Ok(questions) if !questions.is_empty() => {
                    info!(
                        batch_number = next_number,
                        len = questions.len(),
                        adaptive,
                        "next batch ready"
                    );
                    s.slot = NextBatchSlot::Ready(Batch {
                        number: next_number,
                        questions,
                    });
                    s.attempt = 0;
                    s.last_error = None;
                    if s.phase == BatchPhase::PreloadPending {
                        s.phase = BatchPhase::Serving;
                    }
                    None
                }
                Ok(_) => Some(GenerationError::EmptyAfterValidation.to_string()),
                Err(e) => Some(e.to_string()),
            }
        };

        let Some(reason) = failure else {
            shared.notify.notify_waiters();
            return;
        };

        let backoff = random_backoff(&shared.cfg);
        warn!(
            set_count = next_number,
            backoff_ms = backoff.as_millis() as u64,
            %reason,
            "preload failed, retrying"
        );
        {
            let mut s = shared.state.lock();
            s.last_error = Some(reason);
        }
        shared.notify.notify_waiters();

        tokio::time::sleep(backoff).await;

        let stale = {
            let s = shared.state.lock();
            s.phase == BatchPhase::Disposed || s.attempt != token
        };
        if stale {
            return;
        }
    }
}

fn random_backoff(cfg: &EngineConfig) -> Duration {
    let min = cfg.timing.retry_backoff_min_ms;
    let max = cfg.timing.retry_backoff_max_ms.max(min);
    if max == 0 {
        return Duration::ZERO;
    }
    let ms = rand::rng().random_range(min..=max);
    Duration::from_millis(ms)
}

/// One-shot generation with the insufficient-count fallback. Used for
/// unseeded session starts (practice minimum) and for test mode (single
/// upfront batch, minimum 15).
///
/// On a short result, a single reduced-count practice-style attempt is made
/// before the shortfall is surfaced fatally.
pub async fn one_shot_generate(
    source: &dyn QuestionSource,
    params: &TopicParams,
    cfg: &EngineConfig,
    mode: GenerationMode,
    set_count: u32,
) -> Result<Batch, GenerationError> {
    let (count, minimum) = match mode {
        GenerationMode::Test => (cfg.test_batch_size, cfg.min_test_questions),
        GenerationMode::Practice => (cfg.practice_batch_size, cfg.min_practice_questions),
    };

    let request = GenerationRequest {
        params: params.clone(),
        count,
        set_count,
        mode,
        performance: None,
    };
    let questions = validate(source.generate(&request).await?, set_count, false);

    if questions.len() >= minimum {
        return Ok(Batch {
            number: set_count,
            questions,
        });
    }

    warn!(
        got = questions.len(),
        minimum, "generation came up short, trying reduced-count fallback"
    );
    let fallback_request = GenerationRequest {
        params: params.clone(),
        count: minimum,
        set_count,
        mode: GenerationMode::Practice,
        performance: None,
    };
    let fallback = validate(source.generate(&fallback_request).await?, set_count, false);
    if fallback.is_empty() {
        return Err(GenerationError::Insufficient {
            got: questions.len(),
            minimum,
        });
    }
    Ok(Batch {
        number: set_count,
        questions: fallback,
    })
}
