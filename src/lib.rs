//! quizflow — adaptive practice-session engine.
//!
//! Streams batches of multiple-choice questions from a remote generation
//! service indefinitely, preloading the next batch while the current one is
//! being consumed. Rolling answer performance is reduced to a digest that
//! steers generation toward weak topics and an appropriate difficulty.
//! Generation failures retry with randomized backoff; async races (late
//! preloads, manual retries, disposal) are resolved by a single-owner state
//! machine rather than scattered flags.
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use quizflow::{EngineConfig, HttpQuestionSource, PracticeSession, TopicParams};
//!
//! let cfg = EngineConfig::default();
//! let source = Arc::new(HttpQuestionSource::new("https://example.test/generate", &cfg.timing)?);
//! let params = TopicParams::Programming {
//!     language: "rust".into(),
//!     topic: "ownership".into(),
//! };
//! let mut session = PracticeSession::start(source, params, cfg, None, None).await?;
//!
//! while let Some(question) = session.current_question() {
//!     let outcome = session.select_answer(&question.options[0]);
//!     session.advance().await?;
//! }
//! ```

// ─── Core engine ───────────────────────────────────────────────────
pub mod analyzer;
pub mod batch;
pub mod config;
pub mod errors;
pub mod events;
pub mod question;
pub mod session;
pub mod source;
pub mod validator;

// ─── Infrastructure ────────────────────────────────────────────────
pub mod telemetry;
pub mod testing;

pub use analyzer::{analyze, AnalyzerProfile, PerformanceDigest};
pub use batch::{Advance, Batch, BatchManager, BatchPhase};
pub use config::{EngineConfig, TimingConfig};
pub use errors::{GenerationError, QuizflowError, Result, SessionError};
pub use events::{AnswerEvent, EventLog};
pub use question::{Difficulty, Question, RawQuestion};
pub use session::{AnswerOutcome, PracticeSession, SessionSummary, SessionView, StatsSink};
pub use source::{
    GenerationMode, GenerationRequest, HttpQuestionSource, QuestionSource, TopicParams,
};
pub use validator::validate;
