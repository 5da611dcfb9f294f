use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Difficulty bands used both for question tagging and for the analyzer's
/// recommended difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

/// A validated quiz question. Only the validator constructs these; the
/// session controller never sees a raw item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    /// Exactly 4 distinct options, order as generated.
    pub options: Vec<String>,
    /// Always a member of `options`.
    pub correct_answer: String,
    pub explanation: String,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub topic: String,
    /// True when the batch that produced this question was generated from a
    /// performance digest.
    pub is_adaptive: bool,
    pub batch_number: u32,
}

/// A question as it arrives from the source, before validation.
///
/// Every field is optional so deserialization is total: a missing field
/// makes the item invalid, never an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawQuestion {
    #[serde(alias = "question")]
    pub text: Option<String>,
    pub options: Option<Vec<String>>,
    #[serde(alias = "correctAnswer", alias = "answer")]
    pub correct_answer: Option<String>,
    pub explanation: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub hint: Option<String>,
    pub topic: Option<String>,
}

/// Fixed keyword table for deriving a topic when the source omits one.
/// First match wins; scanning order is the table order.
static TOPIC_KEYWORDS: Lazy<Vec<(&'static str, &'static [&'static str])>> = Lazy::new(|| {
    vec![
        ("Data Structures", &["array", "stack", "queue", "linked list", "tree", "graph", "hash"][..]),
        ("Algorithms", &["sort", "search", "recursion", "complexity", "dynamic programming"][..]),
        ("Databases", &["sql", "database", "query", "table", "index", "transaction"][..]),
        ("Networking", &["network", "protocol", "tcp", "http", "socket", "dns"][..]),
        ("Operating Systems", &["process", "thread", "scheduling", "memory management", "deadlock"][..]),
        ("Mathematics", &["equation", "derivative", "integral", "matrix", "probability", "theorem"][..]),
        ("Physics", &["force", "energy", "velocity", "momentum", "circuit", "wave"][..]),
        ("Chemistry", &["reaction", "molecule", "acid", "bond", "element", "compound"][..]),
    ]
});

pub const FALLBACK_TOPIC: &str = "General";

/// Derive a topic from the prompt text via keyword matching.
pub fn infer_topic(text: &str) -> String {
    let lower = text.to_lowercase();
    for (topic, keywords) in TOPIC_KEYWORDS.iter() {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return (*topic).to_string();
        }
    }
    FALLBACK_TOPIC.to_string()
}
