//! Role-based text generation
//!
//! The pipeline never talks to an [`LlmClient`] directly. It asks for text in
//! one of two roles and the router picks the client bound to that role.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CompletionRequest, LlmClient, LlmError, create_client};
use crate::config::LlmConfig;

/// Which backend a prompt is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    /// Cheaper model for divergent steps (brainstorming ideas and prototypes)
    Generator,
    /// Stronger model for convergent steps (selection and refinement)
    Thinker,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::Generator => write!(f, "generator"),
            ModelRole::Thinker => write!(f, "thinker"),
        }
    }
}

/// Generate text for a prompt in a given role
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// One generation call. Failures come back tagged, never as text.
    async fn generate(&self, prompt: &str, role: ModelRole) -> Result<String, LlmError>;

    /// Model name bound to a role (used in apology texts and logs)
    fn model_name(&self, role: ModelRole) -> String;

    /// One generation call that always yields user-facing text
    ///
    /// On failure the error is logged and replaced by the apology text for
    /// the role's model.
    async fn generate_or_apologize(&self, prompt: &str, role: ModelRole) -> String {
        match self.generate(prompt, role).await {
            Ok(text) => text,
            Err(e) => {
                let model = self.model_name(role);
                warn!(%role, %model, error = %e, "generation failed, substituting apology");
                e.apology(&model)
            }
        }
    }
}

/// A client plus the per-request token budget for one role
#[derive(Clone)]
struct RoleBinding {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

/// [`TextGenerator`] backed by one LLM client per role
#[derive(Clone)]
pub struct RoleRouter {
    generator: RoleBinding,
    thinker: RoleBinding,
}

impl RoleRouter {
    /// Bind two clients to the generator and thinker roles
    pub fn new(generator: Arc<dyn LlmClient>, thinker: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        debug!(generator = %generator.model(), thinker = %thinker.model(), "RoleRouter::new: called");
        Self {
            generator: RoleBinding {
                client: generator,
                max_tokens,
            },
            thinker: RoleBinding {
                client: thinker,
                max_tokens,
            },
        }
    }

    /// Build both clients from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!("RoleRouter::from_config: called");
        Ok(Self {
            generator: RoleBinding {
                client: create_client(&config.generator)?,
                max_tokens: config.generator.max_tokens,
            },
            thinker: RoleBinding {
                client: create_client(&config.thinker)?,
                max_tokens: config.thinker.max_tokens,
            },
        })
    }

    fn binding(&self, role: ModelRole) -> &RoleBinding {
        match role {
            ModelRole::Generator => &self.generator,
            ModelRole::Thinker => &self.thinker,
        }
    }
}

#[async_trait]
impl TextGenerator for RoleRouter {
    async fn generate(&self, prompt: &str, role: ModelRole) -> Result<String, LlmError> {
        let binding = self.binding(role);
        debug!(%role, model = %binding.client.model(), prompt_len = prompt.len(), "RoleRouter::generate: called");

        let response = binding
            .client
            .complete(CompletionRequest::user_prompt(prompt, binding.max_tokens))
            .await?;

        let text = response.content.ok_or(LlmError::EmptyContent)?;
        debug!(%role, output_tokens = response.usage.output_tokens, "RoleRouter::generate: success");
        Ok(text.trim().to_string())
    }

    fn model_name(&self, role: ModelRole) -> String {
        self.binding(role).client.model().to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionResponse;
    use crate::llm::client::mock::MockLlmClient;

    #[tokio::test]
    async fn test_router_dispatches_by_role() {
        let generator = Arc::new(MockLlmClient::new("small", vec![CompletionResponse::text("  ideas  ")]));
        let thinker = Arc::new(MockLlmClient::new("big", vec![CompletionResponse::text("verdict")]));
        let router = RoleRouter::new(generator.clone(), thinker.clone(), 1024);

        assert_eq!(router.generate("brainstorm", ModelRole::Generator).await.unwrap(), "ideas");
        assert_eq!(router.generate("judge", ModelRole::Thinker).await.unwrap(), "verdict");

        assert_eq!(generator.prompts(), vec!["brainstorm".to_string()]);
        assert_eq!(thinker.prompts(), vec!["judge".to_string()]);
        assert_eq!(router.model_name(ModelRole::Thinker), "big");
    }

    #[tokio::test]
    async fn test_missing_content_is_tagged_failure() {
        let empty = CompletionResponse {
            content: None,
            ..CompletionResponse::text("")
        };
        let client = Arc::new(MockLlmClient::new("small", vec![empty]));
        let router = RoleRouter::new(client.clone(), client, 1024);

        let err = router.generate("x", ModelRole::Generator).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
    }

    #[tokio::test]
    async fn test_generate_or_apologize_substitutes_text() {
        // exhausted mock fails with InvalidResponse
        let client = Arc::new(MockLlmClient::new("big", vec![]));
        let router = RoleRouter::new(client.clone(), client, 1024);

        let text = router.generate_or_apologize("x", ModelRole::Thinker).await;
        assert_eq!(text, "Sorry, I received an unexpected response structure from my brain (big).");
    }

    #[test]
    fn test_role_display() {
        assert_eq!(ModelRole::Generator.to_string(), "generator");
        assert_eq!(ModelRole::Thinker.to_string(), "thinker");
    }
}
