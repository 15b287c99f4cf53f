//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Theorist - multi-stage LLM problem solver
#[derive(Parser)]
#[command(
    name = "th",
    about = "Refine answers through ideas, approaches and prototypes, or run parallel theories",
    version = env!("CARGO_PKG_VERSION"),
    after_help = after_help()
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Answer a query with one direct generator call
    Ask {
        /// The question to answer
        query: String,
    },

    /// Run the refinement pipeline once and print the final solution
    Solve {
        /// The problem to solve
        query: String,

        /// Number of ideas to brainstorm
        #[arg(long)]
        ideas: Option<usize>,

        /// Number of prototypes to generate
        #[arg(long)]
        prototypes: Option<usize>,

        /// Number of refinement rounds
        #[arg(long)]
        steps: Option<usize>,
    },

    /// Run several pipelines in the background and print the combined theories
    Theories {
        /// The problem to solve
        query: String,

        /// Number of theories (clamped to orchestrator.max-theories)
        #[arg(short = 'n', long = "count", default_value = "1")]
        count: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Invent fictional scientific concepts and their discoveries (AutoSCI)
    Discover {
        /// Number of parallel discoveries
        #[arg(short = 'n', long = "count", default_value = "1")]
        count: usize,

        /// Subject area to draw the concept from
        #[arg(short, long)]
        topic: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration as YAML
    Config,

    /// List prompt templates, or print one
    Prompts {
        /// Template name
        name: Option<String>,
    },
}

/// Output format for task results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Where the log file lives
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("theorist")
        .join("logs")
        .join("theorist.log")
}

fn after_help() -> String {
    format!("Logs are written to: {}", get_log_path().display())
}
