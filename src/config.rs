use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine configuration.
///
/// Every field has a default matching production behavior; embedders
/// typically deserialize a partial config and rely on the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Questions per streamed practice batch.
    #[serde(default = "default_practice_batch_size")]
    pub practice_batch_size: usize,
    /// Questions in the single upfront test batch.
    #[serde(default = "default_test_batch_size")]
    pub test_batch_size: usize,
    /// Zero-based position within a batch at which the next-batch preload
    /// starts (default 2: while the 3rd question is on screen).
    #[serde(default = "default_preload_trigger_index")]
    pub preload_trigger_index: usize,
    /// Minimum validated questions for an on-demand practice generation.
    #[serde(default = "default_min_practice_questions")]
    pub min_practice_questions: usize,
    /// Minimum validated questions for a test-mode generation.
    #[serde(default = "default_min_test_questions")]
    pub min_test_questions: usize,
    /// Answer events required before performance digests are computed.
    #[serde(default = "default_adaptive_unlock_events")]
    pub adaptive_unlock_events: usize,
    /// XP awarded per correct answer.
    #[serde(default = "default_xp_per_correct")]
    pub xp_per_correct: u32,

    #[serde(default)]
    pub timing: TimingConfig,
}

/// Delays and timeouts. All backoff and smoothing behavior lives here so
/// tests can zero it out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Lower bound of the randomized preload retry backoff (ms).
    #[serde(default = "default_retry_backoff_min_ms")]
    pub retry_backoff_min_ms: u64,
    /// Upper bound of the randomized preload retry backoff (ms).
    #[serde(default = "default_retry_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,
    /// Artificial delay during batch swap, for UX smoothing only.
    /// Correctness never depends on it.
    #[serde(default = "default_swap_delay_ms")]
    pub swap_delay_ms: u64,
    /// Question source request timeout (seconds).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            practice_batch_size: default_practice_batch_size(),
            test_batch_size: default_test_batch_size(),
            preload_trigger_index: default_preload_trigger_index(),
            min_practice_questions: default_min_practice_questions(),
            min_test_questions: default_min_test_questions(),
            adaptive_unlock_events: default_adaptive_unlock_events(),
            xp_per_correct: default_xp_per_correct(),
            timing: TimingConfig::default(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            retry_backoff_min_ms: default_retry_backoff_min_ms(),
            retry_backoff_max_ms: default_retry_backoff_max_ms(),
            swap_delay_ms: default_swap_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl TimingConfig {
    pub fn swap_delay(&self) -> Duration {
        Duration::from_millis(self.swap_delay_ms)
    }

    /// Zero out every delay. Used by tests that drive virtual time.
    pub fn instant() -> Self {
        Self {
            retry_backoff_min_ms: 0,
            retry_backoff_max_ms: 0,
            swap_delay_ms: 0,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_practice_batch_size() -> usize {
    10
}

fn default_test_batch_size() -> usize {
    20
}

fn default_preload_trigger_index() -> usize {
    2
}

fn default_min_practice_questions() -> usize {
    5
}

fn default_min_test_questions() -> usize {
    15
}

fn default_adaptive_unlock_events() -> usize {
    7
}

fn default_xp_per_correct() -> u32 {
    2
}

fn default_retry_backoff_min_ms() -> u64 {
    2_000
}

fn default_retry_backoff_max_ms() -> u64 {
    5_000
}

fn default_swap_delay_ms() -> u64 {
    400
}

fn default_request_timeout_secs() -> u64 {
    90
}
