//! Theorist - multi-stage LLM problem solving with parallel theories
//!
//! A query is answered by a four-stage refinement pipeline: brainstorm
//! ideas, pick an approach, elaborate prototypes, then select and refine one
//! prototype over several rounds. The orchestrator runs one to N such
//! pipelines ("theories") concurrently on a bounded worker pool and combines
//! their answers in submission order.
//!
//! # Modules
//!
//! - [`llm`] - LLM client trait, OpenAI-compatible client, role routing
//! - [`prompts`] - Handlebars prompt templates
//! - [`solver`] - Refinement pipeline and AutoSCI discovery
//! - [`orchestrator`] - Task table, worker pool and task lifecycle
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod solver;

// Re-export commonly used types
pub use config::{Config, LlmConfig, ModelConfig, OrchestratorConfig, SolverConfig};
pub use llm::{
    CompletionRequest, CompletionResponse, LlmClient, LlmError, ModelRole, OpenAIClient, RoleRouter, TextGenerator,
    create_client,
};
pub use orchestrator::{
    InMemoryTaskStore, StoreError, Task, TaskId, TaskOrchestrator, TaskStatus, TaskStore, TaskView, TheoryRunner,
    WorkerPool,
};
pub use prompts::{PromptContext, PromptLoader};
pub use solver::{DiscoveryRunner, RefinementPipeline, parse_numbered_list};
