//! Problem solving: the refinement pipeline and the discovery runner

mod discovery;
mod parse;
mod pipeline;

pub use discovery::{DISCOVERY_HEADER, DiscoveryRunner};
pub use parse::parse_numbered_list;
pub use pipeline::{NO_IDEAS_SENTINEL, RefinementPipeline, is_no_ideas_sentinel};

/// First 100 characters of a text, for log lines
pub(crate) fn preview(text: &str) -> String {
    const LIMIT: usize = 100;
    match text.char_indices().nth(LIMIT) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
