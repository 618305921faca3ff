//! GoalDaemon configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::scheduler::EngineConfig;

/// Main GoalDaemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Task/subtask generator configuration
    pub generator: GeneratorConfig,

    /// Scheduler engine configuration
    pub engine: EngineConfig,

    /// Periodic evaluation configuration
    pub evaluation: EvaluationConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// A missing generator API key is not an error here: objective creation
    /// falls back to the fixed task list instead of failing.
    pub fn validate(&self) -> Result<()> {
        if self.evaluation.enabled && self.evaluation.interval_secs == 0 {
            return Err(eyre::eyre!("evaluation.interval-secs must be > 0 when evaluation is enabled"));
        }
        if self.engine.history_cap == 0 {
            return Err(eyre::eyre!("engine.history-cap must be > 0"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .goaldaemon.yml
        let local_config = PathBuf::from(".goaldaemon.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/goaldaemon/goaldaemon.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("goaldaemon").join("goaldaemon.yml");
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

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Task/subtask generator configuration (OpenAI-compatible endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// When false, objectives always get the fixed fallback task list
    pub enabled: bool,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl GeneratorConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

/// Periodic evaluation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Enable the advisory evaluation timer during runs
    pub enabled: bool,

    /// Seconds between evaluations
    #[serde(rename = "interval-secs")]
    pub interval_secs: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Override the data directory (defaults to the platform data dir)
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the data directory for objectives, logs, and knowledge
    pub fn data_dir(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("goaldaemon")
        })
    }
}
