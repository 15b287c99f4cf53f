//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to the
//! embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// A list entry rendered as "{number}: {text}" (numbering starts at 1)
#[derive(Debug, Clone, Serialize)]
pub struct NumberedItem {
    pub number: usize,
    pub text: String,
}

impl NumberedItem {
    /// Number a list of strings in order, starting at 1
    pub fn number_all(items: &[String]) -> Vec<Self> {
        items
            .iter()
            .enumerate()
            .map(|(idx, text)| Self {
                number: idx + 1,
                text: text.clone(),
            })
            .collect()
    }
}

/// Context for rendering prompt templates
///
/// Each stage fills only the fields its template reads.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptContext {
    /// The user's original query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// How many list entries to ask for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Ideas or prototypes shown to the model
    pub items: Vec<NumberedItem>,
    /// The selected approach
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approach: Option<String>,
    /// The current solution being refined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    /// Optional subject area for discovery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl PromptContext {
    pub fn ideas(query: &str, count: usize) -> Self {
        Self {
            query: Some(query.to_string()),
            count: Some(count),
            ..Default::default()
        }
    }

    pub fn approach(query: &str, ideas: &[String]) -> Self {
        Self {
            query: Some(query.to_string()),
            items: NumberedItem::number_all(ideas),
            ..Default::default()
        }
    }

    pub fn prototypes(approach: &str, count: usize) -> Self {
        Self {
            approach: Some(approach.to_string()),
            count: Some(count),
            ..Default::default()
        }
    }

    pub fn select(query: &str, approach: &str, prototypes: &[String]) -> Self {
        Self {
            query: Some(query.to_string()),
            approach: Some(approach.to_string()),
            items: NumberedItem::number_all(prototypes),
            ..Default::default()
        }
    }

    pub fn refine(query: &str, approach: &str, solution: &str) -> Self {
        Self {
            query: Some(query.to_string()),
            approach: Some(approach.to_string()),
            solution: Some(solution.to_string()),
            ..Default::default()
        }
    }

    pub fn discovery(topic: Option<&str>) -> Self {
        Self {
            topic: topic.filter(|t| !t.trim().is_empty()).map(str::to_string),
            ..Default::default()
        }
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine (HTML escaping off; prompts are plain text)
    hbs: Handlebars<'static>,
    /// Override directory checked before the embedded templates
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `dir` before the embedded templates
    pub fn new(dir: Option<&Path>) -> Self {
        debug!(?dir, "PromptLoader::new: called");
        let override_dir = dir.filter(|d| d.is_dir()).map(Path::to_path_buf);
        if dir.is_some() && override_dir.is_none() {
            debug!("PromptLoader::new: override directory missing, using embedded prompts only");
        }

        Self {
            hbs: Self::engine(),
            override_dir,
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            override_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. Override: `{dir}/{name}.pmt`
    /// 2. Embedded fallback
    pub fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in override directory");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
            debug!(?path, "PromptLoader::load_template: not found in override directory");
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        debug!(%name, "PromptLoader::load_template: not found anywhere");
        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render(&self, template_name: &str, context: &PromptContext) -> Result<String> {
        debug!(%template_name, item_count = context.items.len(), "PromptLoader::render: called");
        let template = self.load_template(template_name)?;

        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// Render every known template once so broken overrides fail at startup
    pub fn validate(&self) -> Result<()> {
        debug!("PromptLoader::validate: called");
        let context = PromptContext::default();
        for name in embedded::NAMES {
            self.render(name, &context)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_all_starts_at_one() {
        let items = NumberedItem::number_all(&["a".to_string(), "b".to_string()]);
        assert_eq!(items[0].number, 1);
        assert_eq!(items[1].number, 2);
        assert_eq!(items[1].text, "b");
    }

    #[test]
    fn test_render_ideas_prompt() {
        let loader = PromptLoader::embedded_only();
        let prompt = loader
            .render("ideas", &PromptContext::ideas("How do I \"scale\" a team?", 4))
            .unwrap();

        // quotes are not HTML-escaped
        assert!(prompt.contains("\"How do I \"scale\" a team?\""));
        assert!(prompt.contains("Brainstorm 4 distinct"));
    }

    #[test]
    fn test_render_approach_lists_numbered_ideas() {
        let loader = PromptLoader::embedded_only();
        let ideas = vec!["Cut idle VMs".to_string(), "Buy reserved capacity".to_string()];
        let prompt = loader.render("approach", &PromptContext::approach("q", &ideas)).unwrap();

        assert!(prompt.contains("- Idea 1: Cut idle VMs"));
        assert!(prompt.contains("- Idea 2: Buy reserved capacity"));
    }

    #[test]
    fn test_render_select_lists_numbered_prototypes() {
        let loader = PromptLoader::embedded_only();
        let protos = vec!["P one".to_string(), "P two".to_string()];
        let prompt = loader
            .render("select", &PromptContext::select("q", "the approach", &protos))
            .unwrap();

        assert!(prompt.contains("\"the approach\""));
        assert!(prompt.contains("- Prototype 2: P two"));
    }

    #[test]
    fn test_render_refine_includes_solution() {
        let loader = PromptLoader::embedded_only();
        let prompt = loader
            .render("refine", &PromptContext::refine("q", "a", "current <draft> & notes"))
            .unwrap();
        assert!(prompt.contains("\"current <draft> & notes\""));
    }

    #[test]
    fn test_render_discovery_topic_is_optional() {
        let loader = PromptLoader::embedded_only();

        let without = loader.render("discovery", &PromptContext::discovery(None)).unwrap();
        assert!(!without.contains("Draw your concept from"));

        let with = loader
            .render("discovery", &PromptContext::discovery(Some("oceanography")))
            .unwrap();
        assert!(with.contains("\"oceanography\""));

        let blank = loader.render("discovery", &PromptContext::discovery(Some("  "))).unwrap();
        assert!(!blank.contains("Draw your concept from"));
    }

    #[test]
    fn test_override_directory_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ideas.pmt"), "LIST {{count}} FOR {{query}}").unwrap();

        let loader = PromptLoader::new(Some(dir.path()));
        let prompt = loader.render("ideas", &PromptContext::ideas("q", 3)).unwrap();
        assert_eq!(prompt, "LIST 3 FOR q");

        // templates without an override still come from the binary
        let refine = loader.load_template("refine").unwrap();
        assert_eq!(refine, embedded::REFINE);
    }

    #[test]
    fn test_validate_rejects_broken_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("select.pmt"), "{{#each items}} unterminated").unwrap();

        assert!(PromptLoader::new(Some(dir.path())).validate().is_err());
        assert!(PromptLoader::embedded_only().validate().is_ok());
    }

    #[test]
    fn test_unknown_template() {
        let loader = PromptLoader::embedded_only();
        assert!(loader.load_template("nonexistent-template").is_err());
    }
}
