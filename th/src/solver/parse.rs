//! Parsing of numbered-list model output

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*(.+)").expect("numbered line pattern is valid"));

/// Split model output into at most `limit` list entries
///
/// Lines of the form `N. text` are collected in order. When fewer than half
/// of the requested entries came back numbered, every non-empty line that is
/// not just a number is used instead (duplicates dropped, first one kept).
/// The fallback replaces the numbered matches rather than extending them, so
/// a numbered line reappears verbatim with its `N.` prefix and its stripped
/// text is not listed separately.
/// The result is never empty: unparseable text becomes a single entry.
pub fn parse_numbered_list(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    debug!(text_len = text.len(), %limit, "parse_numbered_list: called");

    let mut entries: Vec<String> = text
        .lines()
        .filter_map(|line| NUMBERED_LINE.captures(line.trim()))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .collect();

    if entries.is_empty() || entries.len() * 2 < limit {
        debug!(numbered = entries.len(), "parse_numbered_list: too few numbered lines, using plain lines");
        entries = plain_lines(text);
    }

    if entries.is_empty() {
        debug!("parse_numbered_list: nothing parsed, wrapping raw text");
        return vec![text.to_string()];
    }

    entries.truncate(limit);
    entries
}

/// Non-empty, non-numeric trimmed lines, de-duplicated in first-seen order
fn plain_lines(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.chars().all(char::is_numeric))
        .filter(|line| seen.insert(*line))
        .map(str::to_string)
        .collect()
}
