//! Configuration loading and validation for toolloop agents.
//!
//! Loads agent settings from `~/.toolloop/config.toml` with environment
//! variable overrides. Validates all settings before an agent is built.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use toolloop_core::agent::ToolChoice;

/// Default system prompt for a tool-calling agent.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an agent that can execute tool calls";

/// Default instruction appended before every think step.
pub const DEFAULT_NEXT_STEP_PROMPT: &str =
    "If you want to stop interaction, use `terminate` tool/function call.";

/// Settings for one tool-calling agent.
///
/// Maps directly to `~/.toolloop/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Agent name, used in logs and events
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_description")]
    pub description: String,

    /// Model passed through to the provider
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// System prompt; empty disables it
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Instruction pushed as a user message before each think step; empty disables it
    #[serde(default = "default_next_step_prompt")]
    pub next_step_prompt: String,

    #[serde(default)]
    pub tool_choice: ToolChoice,

    /// Tools whose invocation can end the run (matched case-insensitively)
    #[serde(default = "default_special_tool_names")]
    pub special_tool_names: Vec<String>,

    /// Step limit for a single run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Truncate each tool observation to this many characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_observe: Option<usize>,

    /// Repeats of the same assistant reply that count as stuck
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: usize,

    /// Extra case-insensitive regexes that mark a reply as a question
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub question_patterns: Vec<String>,
}

fn default_name() -> String {
    "toolcall".into()
}
fn default_description() -> String {
    "an agent that can execute tool calls.".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}
fn default_next_step_prompt() -> String {
    DEFAULT_NEXT_STEP_PROMPT.into()
}
fn default_special_tool_names() -> Vec<String> {
    vec!["terminate".into()]
}
fn default_max_steps() -> u32 {
    30
}
fn default_duplicate_threshold() -> usize {
    2
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: default_description(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            system_prompt: default_system_prompt(),
            next_step_prompt: default_next_step_prompt(),
            tool_choice: ToolChoice::default(),
            special_tool_names: default_special_tool_names(),
            max_steps: default_max_steps(),
            max_observe: None,
            duplicate_threshold: default_duplicate_threshold(),
            question_patterns: Vec::new(),
        }
    }
}

impl AgentSettings {
    /// Load settings from the default path (~/.toolloop/config.toml).
    ///
    /// Environment overrides:
    /// - `TOOLLOOP_MODEL`
    /// - `TOOLLOOP_MAX_STEPS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut settings = Self::load_from(&config_path)?;
        settings.apply_env_overrides(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        Ok(settings)
    }

    /// Parse and validate settings from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply overrides from an environment lookup function.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(model) = lookup("TOOLLOOP_MODEL") {
            self.model = model;
        }

        if let Some(raw) = lookup("TOOLLOOP_MAX_STEPS") {
            self.max_steps = raw.trim().parse().map_err(|_| ConfigError::EnvError {
                var: "TOOLLOOP_MAX_STEPS".into(),
                reason: format!("expected a positive integer, got '{raw}'"),
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolloop")
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "max_steps must be at least 1".into(),
            ));
        }

        if self.max_observe == Some(0) {
            return Err(ConfigError::ValidationError(
                "max_observe must be positive when set".into(),
            ));
        }

        if self.special_tool_names.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "special_tool_names must not contain empty names".into(),
            ));
        }

        Ok(())
    }

    /// The system prompt, or `None` when disabled.
    pub fn system_prompt(&self) -> Option<&str> {
        Some(self.system_prompt.as_str()).filter(|s| !s.is_empty())
    }

    /// The next-step prompt, or `None` when disabled.
    pub fn next_step_prompt(&self) -> Option<&str> {
        Some(self.next_step_prompt.as_str()).filter(|s| !s.is_empty())
    }

    /// Generate a default settings TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
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

    #[error("Invalid value in environment variable {var}: {reason}")]
    EnvError { var: String, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
