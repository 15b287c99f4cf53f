//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Stage 1: brainstorm high-level ideas
pub const IDEAS: &str = include_str!("../../prompts/ideas.pmt");

/// Stage 2: pick or synthesize one approach
pub const APPROACH: &str = include_str!("../../prompts/approach.pmt");

/// Stage 3: elaborate the approach into prototypes
pub const PROTOTYPES: &str = include_str!("../../prompts/prototypes.pmt");

/// Stage 4a: choose the seed prototype verbatim
pub const SELECT: &str = include_str!("../../prompts/select.pmt");

/// Stage 4b: one refinement round
pub const REFINE: &str = include_str!("../../prompts/refine.pmt");

/// Fictional discovery narrative
pub const DISCOVERY: &str = include_str!("../../prompts/discovery.pmt");

/// Names of every embedded template, in pipeline order
pub const NAMES: &[&str] = &["ideas", "approach", "prototypes", "select", "refine", "discovery"];

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "ideas" => Some(IDEAS),
        "approach" => Some(APPROACH),
        "prototypes" => Some(PROTOTYPES),
        "select" => Some(SELECT),
        "refine" => Some(REFINE),
        "discovery" => Some(DISCOVERY),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_resolves() {
        for name in NAMES {
            assert!(get_embedded(name).is_some(), "missing embedded prompt {}", name);
        }
    }

    #[test]
    fn test_list_prompts_ask_for_numbered_lines() {
        assert!(IDEAS.contains("'1. ...'"));
        assert!(PROTOTYPES.contains("'1. ...'"));
    }

    #[test]
    fn test_select_demands_verbatim_answer() {
        assert!(SELECT.contains("ONLY the full text"));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("unknown-template").is_none());
    }
}
