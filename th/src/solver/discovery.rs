//! AutoSCI discovery runner
//!
//! Asks the thinker to invent a fictional scientific concept and narrate a
//! breakthrough that follows from it.

use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use tracing::{debug, info};

use super::preview;
use crate::llm::{ModelRole, TextGenerator};
use crate::orchestrator::TheoryRunner;
use crate::prompts::{PromptContext, PromptLoader};

/// Header placed before every discovery narrative
pub const DISCOVERY_HEADER: &str = "Initiating AutoSCI Discovery Protocol...";

#[derive(Clone)]
pub struct DiscoveryRunner {
    llm: Arc<dyn TextGenerator>,
    prompts: Arc<PromptLoader>,
}

impl DiscoveryRunner {
    pub fn new(llm: Arc<dyn TextGenerator>, prompts: Arc<PromptLoader>) -> Self {
        debug!("DiscoveryRunner::new: called");
        Self { llm, prompts }
    }

    /// One thinker call, optionally steered toward `topic`
    pub async fn discover(&self, topic: Option<&str>) -> Result<String> {
        debug!(?topic, "discover: called");
        let prompt = self.prompts.render("discovery", &PromptContext::discovery(topic))?;
        info!(model = %self.llm.model_name(ModelRole::Thinker), "Sending discovery prompt");

        let narrative = self.llm.generate_or_apologize(&prompt, ModelRole::Thinker).await;
        debug!(narrative = %preview(&narrative), "discover: narrative received");
        Ok(format!("{}\n\n{}", DISCOVERY_HEADER, narrative))
    }
}

#[async_trait]
impl TheoryRunner for DiscoveryRunner {
    /// The query is only a topic hint; a blank query means any field
    async fn run(&self, query: &str) -> Result<String> {
        let topic = Some(query.trim()).filter(|t| !t.is_empty());
        self.discover(topic).await
    }

    fn name(&self) -> &str {
        "discovery"
    }
}
