//! Test doubles for the engine's external collaborators.
//!
//! Production code never depends on this module; it exists so unit and
//! integration tests can script the question source deterministically.

pub mod mock_source;

pub use mock_source::{well_formed_raw, MockOutcome, MockQuestionSource, RecordingStatsSink};
