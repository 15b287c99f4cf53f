//! LLM Client module for Theorist
//!
//! Provides the provider client, the role router and the error type shared by
//! every caller of a language model.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod generator;
mod openai;
mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use generator::{ModelRole, RoleRouter, TextGenerator};
pub use openai::OpenAIClient;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage};

#[cfg(test)]
pub use generator::mock::{Call, ScriptedGenerator};

use crate::config::ModelConfig;

/// Create an LLM client for one model configuration
///
/// "openai" and "ollama" both resolve to the OpenAI-compatible client since
/// Ollama serves the same chat completions endpoint.
pub fn create_client(config: &ModelConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "openai" | "ollama" => {
            debug!("create_client: creating OpenAI-compatible client");
            Ok(Arc::new(OpenAIClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::InvalidResponse(format!(
                "Unknown LLM provider: '{}'. Supported: openai, ollama",
                other
            )))
        }
    }
}
