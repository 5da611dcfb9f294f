//! Question source abstraction and HTTP implementation.
//!
//! The batch manager talks to the remote generation service exclusively
//! through the [`QuestionSource`] trait, which keeps the engine testable
//! against scripted sources (see [`crate::testing`]).

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::TimingConfig;
use crate::errors::GenerationError;
use crate::question::RawQuestion;

pub mod types;

pub use types::{GenerationMode, GenerationRequest, TopicParams};

/// Trait abstraction over the question-generation service, enabling test
/// mocking. Implementations return raw, unvalidated questions.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<RawQuestion>, GenerationError>;
}

/// HTTP question source. Posts the request as JSON and expects an array of
/// raw question objects (bare or under a `questions` key).
pub struct HttpQuestionSource {
    client: Client,
    endpoint: String,
}

impl HttpQuestionSource {
    /// The request timeout is enforced here, on the caller's side; a slow
    /// service surfaces as `GenerationError::Timeout`.
    pub fn new(endpoint: impl Into<String>, timing: &TimingConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timing.request_timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl QuestionSource for HttpQuestionSource {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<RawQuestion>, GenerationError> {
        debug!(
            set_count = request.set_count,
            count = request.count,
            adaptive = request.is_adaptive(),
            "requesting question batch"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::HttpStatus {
                status: status.as_u16(),
                message: truncate(&message, 200),
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;
        parse_questions(body)
    }
}

/// Accept either a bare JSON array or an object with a `questions` array.
/// Items that fail to deserialize individually are kept as empty raw
/// questions and dropped later by validation.
fn parse_questions(body: serde_json::Value) -> Result<Vec<RawQuestion>, GenerationError> {
    let items = match body {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("questions") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(GenerationError::Parse(
                    "response object has no `questions` array".to_string(),
                ))
            }
        },
        other => {
            return Err(GenerationError::Parse(format!(
                "expected array or object, got {}",
                type_name(&other)
            )))
        }
    };

    Ok(items
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap_or_default())
        .collect())
}

fn type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}
