//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Response contained no message content")]
    EmptyContent,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// User-facing text that stands in for an answer when a call fails
    pub fn apology(&self, model: &str) -> String {
        match self {
            LlmError::Json(_) => format!(
                "Sorry, I received a malformed response from my brain ({}). Check logs for details.",
                model
            ),
            LlmError::InvalidResponse(_) | LlmError::EmptyContent => format!(
                "Sorry, I received an unexpected response structure from my brain ({}).",
                model
            ),
            LlmError::RateLimited { .. }
            | LlmError::ApiError { .. }
            | LlmError::Network(_)
            | LlmError::Timeout(_) => {
                format!("Sorry, I'm having trouble connecting to my brain ({}) right now.", model)
            }
        }
    }
}
