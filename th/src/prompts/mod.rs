//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files for the refinement
//! pipeline stages and the discovery runner.
//!
//! Template loading chain:
//! 1. `{prompts.dir}/{name}.pmt` (configured override directory)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax for variable substitution.

pub mod embedded;
mod loader;

pub use loader::{NumberedItem, PromptContext, PromptLoader};
