//! RefinementPipeline - ideas, approach, prototypes, evolution
//!
//! Turns one query into one answer through four strictly sequential stages.
//! Divergent stages use the generator role, convergent ones the thinker.
//! Generation failures never abort a run: the apology text for the failed
//! call is carried forward as if the model had written it.

use std::sync::Arc;

use eyre::Result;
use tracing::{debug, info};

use super::parse::parse_numbered_list;
use super::preview;
use crate::config::SolverConfig;
use crate::llm::{ModelRole, TextGenerator};
use crate::prompts::{PromptContext, PromptLoader};

/// Prefix of the stage 2 answer when there were no ideas to choose from
pub const NO_IDEAS_SENTINEL: &str = "No initial ideas provided to select from for query";

/// True if an approach is the stage 2 "no ideas" sentinel
pub fn is_no_ideas_sentinel(approach: &str) -> bool {
    approach.starts_with(NO_IDEAS_SENTINEL)
}

/// The four-stage problem solver
#[derive(Clone)]
pub struct RefinementPipeline {
    llm: Arc<dyn TextGenerator>,
    prompts: Arc<PromptLoader>,
    config: SolverConfig,
}

impl RefinementPipeline {
    pub fn new(llm: Arc<dyn TextGenerator>, prompts: Arc<PromptLoader>, config: SolverConfig) -> Self {
        debug!(?config, "RefinementPipeline::new: called");
        Self { llm, prompts, config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    async fn ask(&self, template: &str, context: &PromptContext, role: ModelRole) -> Result<String> {
        let prompt = self.prompts.render(template, context)?;
        Ok(self.llm.generate_or_apologize(&prompt, role).await)
    }

    /// Stage 1: brainstorm up to `count` strategic directions
    pub async fn generate_ideas(&self, query: &str, count: usize) -> Result<Vec<String>> {
        debug!(%count, "generate_ideas: called");
        let raw = self
            .ask("ideas", &PromptContext::ideas(query, count), ModelRole::Generator)
            .await?;
        Ok(parse_numbered_list(&raw, count))
    }

    /// Stage 2: pick or synthesize one guiding approach
    ///
    /// With no ideas this returns the sentinel without calling a model.
    pub async fn select_approach(&self, query: &str, ideas: &[String]) -> Result<String> {
        debug!(idea_count = ideas.len(), "select_approach: called");
        if ideas.is_empty() {
            debug!("select_approach: no ideas, returning sentinel");
            return Ok(format!("{}: {}", NO_IDEAS_SENTINEL, query));
        }

        let approach = self
            .ask("approach", &PromptContext::approach(query, ideas), ModelRole::Thinker)
            .await?;
        Ok(approach.trim().to_string())
    }

    /// Stage 3: elaborate the approach into up to `count` prototypes
    pub async fn generate_prototypes(&self, approach: &str, count: usize) -> Result<Vec<String>> {
        debug!(%count, "generate_prototypes: called");
        let raw = self
            .ask("prototypes", &PromptContext::prototypes(approach, count), ModelRole::Generator)
            .await?;
        Ok(parse_numbered_list(&raw, count))
    }

    /// Stage 4: choose a seed prototype, then rewrite it `max_steps` times
    ///
    /// Makes exactly `max_steps + 1` thinker calls for a non-empty prototype
    /// list. Each round replaces the solution; no history is kept.
    pub async fn evolve(&self, query: &str, approach: &str, prototypes: &[String], max_steps: usize) -> Result<String> {
        debug!(prototype_count = prototypes.len(), %max_steps, "evolve: called");
        if prototypes.is_empty() {
            return Ok(format!(
                "No prototypes were generated for the approach: '{}'. Cannot evolve.",
                approach
            ));
        }

        let mut solution = self
            .ask(
                "select",
                &PromptContext::select(query, approach, prototypes),
                ModelRole::Thinker,
            )
            .await?
            .trim()
            .to_string();
        info!(seed = %preview(&solution), "Initial best prototype selected");

        for step in 1..=max_steps {
            info!(step, max_steps, "Evolution step");
            solution = self
                .ask(
                    "refine",
                    &PromptContext::refine(query, approach, &solution),
                    ModelRole::Thinker,
                )
                .await?
                .trim()
                .to_string();
            debug!(step, solution = %preview(&solution), "evolve: solution replaced");
        }

        Ok(solution)
    }

    /// One generator call on the raw query, bypassing the pipeline
    pub async fn answer_directly(&self, query: &str, role: ModelRole) -> String {
        debug!(%role, "answer_directly: called");
        self.llm.generate_or_apologize(query, role).await
    }

    /// Run all four stages with the configured counts
    ///
    /// Short-circuits: no ideas answers directly with the generator, no
    /// approach answers directly with the thinker, no prototypes returns the
    /// approach itself.
    pub async fn solve(&self, query: &str) -> Result<String> {
        info!(query = %preview(query), "Stage 1 - generating initial ideas");
        let ideas = self.generate_ideas(query, self.config.num_ideas).await?;
        if ideas.is_empty() {
            info!("No initial ideas generated, falling back to a direct generator answer");
            return Ok(self.answer_directly(query, ModelRole::Generator).await);
        }
        info!(count = ideas.len(), "Generated initial ideas");

        info!("Stage 2 - selecting best approach");
        let approach = self.select_approach(query, &ideas).await?;
        if approach.is_empty() || is_no_ideas_sentinel(&approach) {
            info!(?ideas, "Could not select an approach, falling back to a direct thinker answer");
            return Ok(self.answer_directly(query, ModelRole::Thinker).await);
        }
        info!(approach = %preview(&approach), "Selected approach");

        info!("Stage 3 - generating prototypes");
        let prototypes = self.generate_prototypes(&approach, self.config.num_prototypes).await?;
        if prototypes.is_empty() {
            info!("No prototypes generated, using the approach as the answer");
            return Ok(approach);
        }
        info!(count = prototypes.len(), "Generated prototypes");

        info!("Stage 4 - selecting and evolving the best prototype");
        let solution = self
            .evolve(query, &approach, &prototypes, self.config.evolution_steps)
            .await?;
        info!("Multi-step refinement complete");
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, ScriptedGenerator};

    fn pipeline(llm: Arc<ScriptedGenerator>, config: SolverConfig) -> RefinementPipeline {
        RefinementPipeline::new(llm, Arc::new(PromptLoader::embedded_only()), config)
    }

    #[tokio::test]
    async fn test_generate_ideas_uses_generator_role() {
        let llm = Arc::new(ScriptedGenerator::new(["1. a\n2. b\n3. c"]));
        let p = pipeline(llm.clone(), SolverConfig::default());

        let ideas = p.generate_ideas("q", 3).await.unwrap();

        assert_eq!(ideas, vec!["a", "b", "c"]);
        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].role, ModelRole::Generator);
        assert!(calls[0].prompt.contains("Brainstorm 3 distinct"));
    }

    #[tokio::test]
    async fn test_generate_ideas_unparseable_is_single_idea() {
        let llm = Arc::new(ScriptedGenerator::new(["Just do less."]));
        let p = pipeline(llm, SolverConfig::default());

        assert_eq!(p.generate_ideas("q", 5).await.unwrap(), vec!["Just do less."]);
    }

    #[tokio::test]
    async fn test_select_approach_without_ideas_makes_no_call() {
        let llm = Arc::new(ScriptedGenerator::new(Vec::<String>::new()));
        let p = pipeline(llm.clone(), SolverConfig::default());

        let approach = p.select_approach("reduce costs", &[]).await.unwrap();

        assert!(is_no_ideas_sentinel(&approach));
        assert!(approach.ends_with("reduce costs"));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_select_approach_uses_thinker_and_trims() {
        let llm = Arc::new(ScriptedGenerator::new(["  Focus on idle resources.  "]));
        let p = pipeline(llm.clone(), SolverConfig::default());

        let approach = p.select_approach("q", &["x".to_string()]).await.unwrap();

        assert_eq!(approach, "Focus on idle resources.");
        assert_eq!(llm.calls_for(ModelRole::Thinker), 1);
    }

    #[tokio::test]
    async fn test_evolve_makes_steps_plus_one_thinker_calls() {
        for steps in 0..4 {
            let llm = Arc::new(ScriptedGenerator::new(Vec::<String>::new()));
            let p = pipeline(llm.clone(), SolverConfig::default());

            p.evolve("q", "a", &["p1".to_string(), "p2".to_string()], steps)
                .await
                .unwrap();

            assert_eq!(llm.calls_for(ModelRole::Thinker), steps + 1);
            assert_eq!(llm.calls_for(ModelRole::Generator), 0);
        }
    }

    #[tokio::test]
    async fn test_evolve_replaces_solution_each_round() {
        let llm = Arc::new(ScriptedGenerator::new(["seed", "better", "best"]));
        let p = pipeline(llm.clone(), SolverConfig::default());

        let solution = p.evolve("q", "a", &["seed".to_string()], 2).await.unwrap();

        assert_eq!(solution, "best");
        let calls = llm.calls();
        assert!(calls[1].prompt.contains("\"seed\""));
        assert!(calls[2].prompt.contains("\"better\""));
        assert!(!calls[2].prompt.contains("\"seed\""));
    }

    #[tokio::test]
    async fn test_evolve_without_prototypes() {
        let llm = Arc::new(ScriptedGenerator::new(Vec::<String>::new()));
        let p = pipeline(llm.clone(), SolverConfig::default());

        let out = p.evolve("q", "the plan", &[], 2).await.unwrap();
        assert_eq!(out, "No prototypes were generated for the approach: 'the plan'. Cannot evolve.");
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_solve_runs_all_stages_in_order() {
        let llm = Arc::new(ScriptedGenerator::new([
            "1. i1\n2. i2\n3. i3\n4. i4\n5. i5",
            "approach",
            "1. p1\n2. p2\n3. p3\n4. p4\n5. p5",
            "p3",
            "refined once",
            "refined twice",
        ]));
        let p = pipeline(llm.clone(), SolverConfig::default());

        assert_eq!(p.solve("q").await.unwrap(), "refined twice");

        let roles: Vec<ModelRole> = llm.calls().iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![
                ModelRole::Generator,
                ModelRole::Thinker,
                ModelRole::Generator,
                ModelRole::Thinker,
                ModelRole::Thinker,
                ModelRole::Thinker,
            ]
        );
    }

    #[tokio::test]
    async fn test_solve_blank_approach_falls_back_to_thinker() {
        let llm = Arc::new(ScriptedGenerator::new(["1. a\n2. b\n3. c", "   ", "direct answer"]));
        let p = pipeline(llm.clone(), SolverConfig::default());

        assert_eq!(p.solve("raw query").await.unwrap(), "direct answer");

        let calls = llm.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].role, ModelRole::Thinker);
        assert_eq!(calls[2].prompt, "raw query");
    }

    #[tokio::test]
    async fn test_generation_failure_is_carried_forward() {
        let llm = Arc::new(ScriptedGenerator::with_results(vec![
            Ok("1. a\n2. b\n3. c".to_string()),
            Err(LlmError::Timeout(std::time::Duration::from_secs(1))),
        ]));
        let p = pipeline(llm.clone(), SolverConfig::default());

        let approach = p
            .select_approach("q", &p.generate_ideas("q", 3).await.unwrap())
            .await
            .unwrap();

        assert_eq!(
            approach,
            "Sorry, I'm having trouble connecting to my brain (scripted-thinker) right now."
        );
    }

    #[tokio::test]
    async fn test_broken_template_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ideas.pmt"), "{{#if}}").unwrap();
        let llm = Arc::new(ScriptedGenerator::new(Vec::<String>::new()));
        let p = RefinementPipeline::new(
            llm.clone(),
            Arc::new(PromptLoader::new(Some(dir.path()))),
            SolverConfig::default(),
        );

        assert!(p.solve("q").await.is_err());
        assert_eq!(llm.call_count(), 0);
    }
}
