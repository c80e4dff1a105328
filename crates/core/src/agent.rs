//! Agent state and tool-choice policy types.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one agent run.
///
/// The turn controller only ever moves `Running` to `Finished`; `Idle` and
/// `Error` are owned by the outer run loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Not processing a request
    #[default]
    Idle,
    /// A run is in progress
    Running,
    /// A special tool or an unrecoverable input limit ended the run
    Finished,
    /// The last step failed
    Error,
}

impl AgentState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// How the model may use tools on a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Tools are available; plain content is also acceptable
    #[default]
    Auto,
    /// Every turn must produce at least one tool call
    Required,
    /// Tools are not offered; only content is used
    None,
}

impl std::fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Required => "required",
            Self::None => "none",
        };
        f.write_str(s)
    }
}
