//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use parley_core::AgentConfiguration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model used by agents that do not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    /// LLM client used by agents that do not name one
    #[serde(default = "default_provider")]
    pub default_provider: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Agent records, resolved against the defaults above
    #[serde(default)]
    pub agents: Vec<AgentConfiguration>,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_provider() -> String {
    "simulated".into()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace | debug | info | warn | error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of the human-readable format
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Base delay between agent retries; doubled on each attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl OrchestratorConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `PARLEY_MODEL`
    /// - `PARLEY_PROVIDER`
    /// - `PARLEY_LOG`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config = Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        tracing::debug!(path = %path.display(), agents = config.agents.len(), "Config loaded");
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("PARLEY_MODEL") {
            self.default_model = model;
        }
        if let Some(provider) = lookup("PARLEY_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(level) = lookup("PARLEY_LOG") {
            self.logging.level = level;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.agent_id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "agent_id must not be empty".into(),
                ));
            }
            if !seen.insert(agent.agent_id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate agent_id '{}'",
                    agent.agent_id
                )));
            }
            if !(0.0..=2.0).contains(&agent.temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}': temperature must be between 0.0 and 2.0",
                    agent.agent_id
                )));
            }
            if agent.max_tool_calls == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}': max_tool_calls must be > 0",
                    agent.agent_id
                )));
            }
        }

        Ok(())
    }

    /// Agent records with model and provider defaults filled in.
    pub fn resolved_agents(&self) -> Vec<AgentConfiguration> {
        self.agents
            .iter()
            .cloned()
            .map(|mut agent| {
                if agent.model_name.is_empty() {
                    agent.model_name = self.default_model.clone();
                }
                if agent.provider.is_empty() {
                    agent.provider = self.default_provider.clone();
                }
                if agent.agent_name.is_empty() {
                    agent.agent_name = agent.agent_id.clone();
                }
                agent
            })
            .collect()
    }

    /// Render the effective config as TOML (for the `config` command).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            default_provider: default_provider(),
            logging: LoggingConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            persistence: PersistenceConfig::default(),
            agents: vec![],
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for parley_core::Error {
    fn from(e: ConfigError) -> Self {
        parley_core::Error::Config {
            message: e.to_string(),
        }
    }
}
