use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use theorist::cli::{Cli, Command, OutputFormat, get_log_path};
use theorist::config::Config;
use theorist::llm::{ModelRole, RoleRouter, TextGenerator};
use theorist::orchestrator::{TaskId, TaskOrchestrator, TaskStatus, TaskView, TheoryRunner};
use theorist::prompts::{PromptLoader, embedded};
use theorist::solver::{DiscoveryRunner, RefinementPipeline};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // logging isn't initialized yet, so nothing can be traced here
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        generator = %config.llm.generator.model,
        thinker = %config.llm.thinker.model,
        "Theorist loaded config"
    );

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Ask { query } => cmd_ask(&config, &query).await,
        Command::Solve {
            query,
            ideas,
            prototypes,
            steps,
        } => {
            let mut config = config;
            if let Some(k) = ideas {
                config.solver.num_ideas = k;
            }
            if let Some(m) = prototypes {
                config.solver.num_prototypes = m;
            }
            if let Some(r) = steps {
                config.solver.evolution_steps = r;
            }
            cmd_solve(&config, &query).await
        }
        Command::Theories { query, count, format } => {
            let runner = Arc::new(build_pipeline(&config)?);
            cmd_run_task(&config, runner, &query, count, format).await
        }
        Command::Discover { count, topic, format } => {
            let runner = Arc::new(DiscoveryRunner::new(build_router(&config)?, build_prompts(&config)?));
            cmd_run_task(&config, runner, topic.as_deref().unwrap_or_default(), count, format).await
        }
        Command::Config => cmd_config(&config),
        Command::Prompts { name } => cmd_prompts(&config, name.as_deref()),
    }
}

fn build_router(config: &Config) -> Result<Arc<dyn TextGenerator>> {
    let router = RoleRouter::from_config(&config.llm).context("Failed to create LLM clients")?;
    Ok(Arc::new(router))
}

fn build_prompts(config: &Config) -> Result<Arc<PromptLoader>> {
    let loader = PromptLoader::new(config.prompts.dir.as_deref());
    loader.validate().context("Prompt templates failed to render")?;
    Ok(Arc::new(loader))
}

fn build_pipeline(config: &Config) -> Result<RefinementPipeline> {
    Ok(RefinementPipeline::new(
        build_router(config)?,
        build_prompts(config)?,
        config.solver.clone(),
    ))
}

async fn cmd_ask(config: &Config, query: &str) -> Result<()> {
    debug!("cmd_ask: called");
    let answer = build_router(config)?
        .generate_or_apologize(query, ModelRole::Generator)
        .await;
    println!("{}", answer);
    Ok(())
}

async fn cmd_solve(config: &Config, query: &str) -> Result<()> {
    debug!(?config.solver, "cmd_solve: called");
    let pipeline = build_pipeline(config)?;
    eprintln!(
        "{} ideas={} prototypes={} steps={}",
        "Solving".cyan(),
        config.solver.num_ideas,
        config.solver.num_prototypes,
        config.solver.evolution_steps
    );
    let solution = pipeline.solve(query).await?;
    println!("{}", solution);
    Ok(())
}

/// Submit a task, wait for it to finish, then consume and print it
async fn cmd_run_task(
    config: &Config,
    runner: Arc<dyn TheoryRunner>,
    query: &str,
    count: usize,
    format: OutputFormat,
) -> Result<()> {
    debug!(runner = runner.name(), %count, %format, "cmd_run_task: called");
    let orchestrator = TaskOrchestrator::new(runner, &config.orchestrator);
    let id = orchestrator.submit(query, count)?;

    let view = wait_for_task(&orchestrator, &id, config.orchestrator.poll_interval(), format).await;
    orchestrator.shutdown().await;
    let view = view?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
        OutputFormat::Text => print_view(&view),
    }

    if view.status == TaskStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}

async fn wait_for_task(
    orchestrator: &TaskOrchestrator,
    id: &TaskId,
    interval: std::time::Duration,
    format: OutputFormat,
) -> Result<TaskView> {
    let mut reported = usize::MAX;
    loop {
        let view = orchestrator
            .poll(id)
            .ok_or_else(|| eyre!("Task {} disappeared", id))?;

        if format == OutputFormat::Text && view.theories_done != reported {
            eprintln!(
                "{} task {} {}/{} theories done",
                "…".dimmed(),
                id.short().cyan(),
                view.theories_done,
                view.theory_count
            );
            reported = view.theories_done;
        }

        if view.status.is_terminal() {
            return orchestrator
                .consume(id)
                .ok_or_else(|| eyre!("Task {} vanished before it could be consumed", id));
        }
        tokio::time::sleep(interval).await;
    }
}

fn print_view(view: &TaskView) {
    match view.status {
        TaskStatus::Completed => {
            eprintln!("{} Task {} completed", "✓".green(), view.task_id.short());
            if let Some(result) = &view.result {
                println!("{}", result);
            }
        }
        TaskStatus::Failed => {
            eprintln!("{} Task {} failed", "✗".red(), view.task_id.short());
            if let Some(error) = &view.error {
                println!("{}", error.red());
            }
        }
        status => println!("Task {} is {}", view.task_id.short(), status.to_string().yellow()),
    }
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}

fn cmd_prompts(config: &Config, name: Option<&str>) -> Result<()> {
    debug!(?name, "cmd_prompts: called");
    let loader = PromptLoader::new(config.prompts.dir.as_deref());
    match name {
        Some(name) => print!("{}", loader.load_template(name)?),
        None => {
            for name in embedded::NAMES {
                println!("{}", name.cyan());
            }
        }
    }
    Ok(())
}
