use serde::{Deserialize, Serialize};

use crate::analyzer::PerformanceDigest;

/// Generation mode. Practice batches stream indefinitely; a test is one
/// fixed-size batch generated upfront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Practice,
    Test,
}

/// Topic/unit identification. Two parameter shapes exist upstream; the
/// engine treats both as opaque routing data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TopicParams {
    Programming {
        language: String,
        topic: String,
    },
    Academic {
        college: String,
        department: String,
        semester: String,
        subject: String,
        unit: String,
    },
}

/// One request to the question source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(flatten)]
    pub params: TopicParams,
    pub count: usize,
    /// Batch-number tag, 1-based.
    pub set_count: u32,
    pub mode: GenerationMode,
    /// Present only for adaptive requests (≥ 7 answer events recorded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceDigest>,
}

impl GenerationRequest {
    pub fn is_adaptive(&self) -> bool {
        self.performance.is_some()
    }
}
