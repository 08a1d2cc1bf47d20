//! Configuration loading (.relay.toml)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = ".relay.toml";

/// Find a config file by walking up the directory tree, then checking global config.
///
/// Search order:
/// 1. Current directory and parent directories (walking up to root)
/// 2. Global config at ~/.config/relay/
fn find_config_file(filename: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("relay").join(filename);
        if global_path.exists() {
            return Some(global_path);
        }
    }

    None
}

/// Values that parse but cannot be used
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("[{section}] {field} must be greater than zero")]
    Zero {
        section: &'static str,
        field: &'static str,
    },
}

/// Top-level configuration (from .relay.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentSectionConfig,
    #[serde(default)]
    pub workflow: WorkflowSectionConfig,
    #[serde(default)]
    pub auth: AuthSectionConfig,
}

/// LLM configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Per-agent execution limits applied when a definition does not set its own
#[derive(Debug, Clone, Deserialize)]
pub struct AgentSectionConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub fail_on_tool_error: bool,
}

/// Workflow execution section
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSectionConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_max_consecutive_unparseable")]
    pub max_consecutive_unparseable: usize,
    /// Number of most recent steps replayed with the long truncation
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_recent_output_chars")]
    pub recent_output_chars: usize,
    #[serde(default = "default_summary_output_chars")]
    pub summary_output_chars: usize,
}

/// Auth cache section
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSectionConfig {
    #[serde(default = "default_validity_minutes")]
    pub validity_minutes: u64,
    /// Where `relay` persists the cache between invocations
    pub cache_file: Option<String>,
}

// Default value functions
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen3:14b".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_iterations() -> usize {
    10
}

fn default_max_consecutive_unparseable() -> usize {
    2
}

fn default_history_window() -> usize {
    3
}

fn default_recent_output_chars() -> usize {
    2000
}

fn default_summary_output_chars() -> usize {
    200
}

fn default_validity_minutes() -> u64 {
    10
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AgentSectionConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            fail_on_tool_error: false,
        }
    }
}

impl Default for WorkflowSectionConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_consecutive_unparseable: default_max_consecutive_unparseable(),
            history_window: default_history_window(),
            recent_output_chars: default_recent_output_chars(),
            summary_output_chars: default_summary_output_chars(),
        }
    }
}

impl Default for AuthSectionConfig {
    fn default() -> Self {
        Self {
            validity_minutes: default_validity_minutes(),
            cache_file: None,
        }
    }
}

impl AuthSectionConfig {
    pub fn validity(&self) -> Duration {
        Duration::from_secs(self.validity_minutes * 60)
    }

    /// Cache file path with a leading `~` expanded, or the default under the
    /// user cache directory
    pub fn cache_path(&self) -> Option<PathBuf> {
        match self.cache_file.as_deref() {
            Some(path) => Some(expand_home(path)),
            None => dirs::cache_dir().map(|dir| dir.join("relay").join("auth_cache.json")),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

impl RelayConfig {
    /// Load config from .relay.toml
    ///
    /// Search order:
    /// 1. Walk up directory tree from cwd looking for .relay.toml
    /// 2. Check ~/.config/relay/.relay.toml (global fallback)
    /// 3. Fall back to defaults
    pub fn load() -> Result<Self> {
        if let Some(config_path) = find_config_file(CONFIG_FILE) {
            tracing::debug!("Loading config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: RelayConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("agent", "max_iterations", self.agent.max_iterations),
            ("workflow", "max_iterations", self.workflow.max_iterations),
            (
                "workflow",
                "max_consecutive_unparseable",
                self.workflow.max_consecutive_unparseable,
            ),
        ];

        match checks.iter().find(|(_, _, value)| *value == 0) {
            Some(&(section, field, _)) => Err(ConfigError::Zero { section, field }),
            None => Ok(()),
        }
    }

    /// Get the default model (for use elsewhere)
    pub fn default_model() -> String {
        default_model()
    }

    /// Get the default Ollama URL (for use elsewhere)
    pub fn default_ollama_url() -> String {
        default_ollama_url()
    }
}
