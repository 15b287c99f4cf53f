//! Theorist configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main Theorist configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR); the CLI flag wins
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Model bindings for the two roles
    pub llm: LlmConfig,

    /// Refinement pipeline parameters
    pub solver: SolverConfig,

    /// Background task limits
    pub orchestrator: OrchestratorConfig,

    /// Prompt template overrides
    pub prompts: PromptsConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .theorist.yml
        let local_config = PathBuf::from(".theorist.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/theorist/theorist.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("theorist").join("theorist.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed here; `load` reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".theorist.yml")];
                if let Some(dir) = dirs::config_dir() {
                    paths.push(dir.join("theorist").join("theorist.yml"));
                }
                paths
            }
        };

        candidates
            .into_iter()
            .find(|p| p.exists())
            .and_then(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Model bindings for the generator and thinker roles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Cheaper model for brainstorming ideas and prototypes
    pub generator: ModelConfig,

    /// Stronger model for selection and refinement
    pub thinker: ModelConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            generator: ModelConfig::default(),
            thinker: ModelConfig {
                model: "sparksammy/samantha-thinker-v2".to_string(),
                ..ModelConfig::default()
            },
        }
    }
}

/// One model endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider name ("openai" or "ollama"; both speak chat completions)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// API base URL (without the /v1 suffix)
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API key, if the server wants one
    #[serde(rename = "api-key-env", skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Transport-level retries for 5xx/429/network errors
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "sparksammy/tinysam-l3.2-v2".to_string(),
            base_url: "https://ollama-api.nodemixaholic.com".to_string(),
            api_key_env: None,
            max_tokens: 4096,
            timeout_ms: 300_000,
            max_retries: 0,
        }
    }
}

impl ModelConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }
}

/// Refinement pipeline parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Ideas requested in stage 1
    #[serde(rename = "num-ideas")]
    pub num_ideas: usize,

    /// Prototypes requested in stage 3
    #[serde(rename = "num-prototypes")]
    pub num_prototypes: usize,

    /// Refinement rounds in stage 4
    #[serde(rename = "evolution-steps")]
    pub evolution_steps: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            num_ideas: 5,
            num_prototypes: 5,
            evolution_steps: 2,
        }
    }
}

/// Background task limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Worker pool size; theories beyond this wait for a free worker
    #[serde(rename = "pool-size")]
    pub pool_size: usize,

    /// Upper bound on theories per task
    #[serde(rename = "max-theories")]
    pub max_theories: usize,

    /// How often the CLI polls a running task
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pool_size: 2,
            max_theories: 3,
            poll_interval_ms: 1000,
        }
    }
}

impl OrchestratorConfig {
    /// Get the poll interval as a Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Prompt template overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory searched for `{name}.pmt` before the embedded templates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}
