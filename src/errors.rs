use thiserror::Error;

/// The central error type for the quizflow engine.
///
/// This hierarchy enables programmatic recovery and unified error handling
/// across the batch manager, session controller, and question source layers.
#[derive(Error, Debug)]
pub enum QuizflowError {
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures while asking the question source for a batch.
///
/// Every variant except `Insufficient` is transparently retryable by the
/// batch manager; `Insufficient` triggers one reduced-count fallback attempt
/// before it is surfaced.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Question source request timed out")]
    Timeout,

    #[error("Question source returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse question source response: {0}")]
    Parse(String),

    #[error("Generation produced no valid questions")]
    EmptyAfterValidation,

    #[error("Generation returned {got} questions, minimum is {minimum}")]
    Insufficient { got: usize, minimum: usize },
}

impl GenerationError {
    /// True for failures the batch manager may retry on its own.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GenerationError::Insufficient { .. })
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session has been disposed")]
    Disposed,

    #[error("No active question")]
    NoActiveQuestion,
}

pub type Result<T> = std::result::Result<T, QuizflowError>;
