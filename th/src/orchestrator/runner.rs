//! The unit of work the orchestrator runs for each theory

use async_trait::async_trait;
use eyre::Result;

use crate::solver::RefinementPipeline;

/// Produces one theory for a query
#[async_trait]
pub trait TheoryRunner: Send + Sync {
    async fn run(&self, query: &str) -> Result<String>;

    /// Short label for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl TheoryRunner for RefinementPipeline {
    async fn run(&self, query: &str) -> Result<String> {
        self.solve(query).await
    }

    fn name(&self) -> &str {
        "refinement"
    }
}
