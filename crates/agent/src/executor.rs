//! Tool execution with isolated failure handling.
//!
//! [`ToolExecutor::execute`] never fails: an unknown tool, malformed
//! arguments, a tool error or even a panicking tool all come back as an
//! `Error: …` observation the model can read and correct. One bad call
//! therefore never aborts its siblings in the same turn.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use toolloop_core::agent::AgentState;
use toolloop_core::error::ToolError;
use toolloop_core::event::{DomainEvent, EventBus};
use toolloop_core::message::ToolCall;
use toolloop_core::tool::{ToolOutput, ToolRegistry};
use toolloop_tools::{ASK_USER_TOOL, TERMINATE_TOOL};
use tracing::{error, info};

/// Outcome of one executed tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Text to record as the tool's response.
    Observation(String),
    /// The tool needs the user; the payload is passed up untouched.
    SuspendForUserInput(serde_json::Value),
}

impl ToolOutcome {
    pub fn observation(&self) -> Option<&str> {
        match self {
            Self::Observation(text) => Some(text),
            Self::SuspendForUserInput(_) => None,
        }
    }
}

/// Decides whether a special tool ends the run. Receives the tool name and
/// its raw result.
pub type FinishPredicate = Arc<dyn Fn(&str, &serde_json::Value) -> bool + Send + Sync>;

/// Which tools end the run, and when.
#[derive(Clone)]
pub struct SpecialToolPolicy {
    names: Vec<String>,
    finish_when: FinishPredicate,
}

impl SpecialToolPolicy {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            names: names.into_iter().map(|n| n.into().to_lowercase()).collect(),
            finish_when: Arc::new(|_, _| true),
        }
    }

    /// Replace the finish predicate (default: always finish).
    pub fn with_finish_predicate(
        mut self,
        predicate: impl Fn(&str, &serde_json::Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.finish_when = Arc::new(predicate);
        self
    }

    pub fn is_special(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.names.iter().any(|n| *n == name)
    }

    /// Apply the policy to an executed tool. Returns `true` if the run
    /// moved to [`AgentState::Finished`].
    ///
    /// `ask_user` never finishes the run, even when listed as special: the
    /// agent has to stay alive to receive the answer.
    pub fn apply(&self, name: &str, result: &serde_json::Value, state: &mut AgentState) -> bool {
        if !self.is_special(name) {
            return false;
        }

        if name.eq_ignore_ascii_case(ASK_USER_TOOL) {
            info!(tool = %name, "Special tool is waiting for user input");
            return false;
        }

        if (self.finish_when)(name, result) {
            info!(tool = %name, "Special tool has completed the task");
            *state = AgentState::Finished;
            return true;
        }

        false
    }
}

impl Default for SpecialToolPolicy {
    fn default() -> Self {
        Self::new([TERMINATE_TOOL])
    }
}

impl std::fmt::Debug for SpecialToolPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecialToolPolicy")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

/// Resolves, invokes and reports on tool calls.
pub struct ToolExecutor {
    tools: Arc<ToolRegistry>,
    policy: SpecialToolPolicy,
    event_bus: Arc<EventBus>,
}

impl ToolExecutor {
    pub fn new(tools: Arc<ToolRegistry>, policy: SpecialToolPolicy, event_bus: Arc<EventBus>) -> Self {
        Self {
            tools,
            policy,
            event_bus,
        }
    }

    /// Swap the special-tool policy.
    pub fn with_policy(mut self, policy: SpecialToolPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn policy(&self) -> &SpecialToolPolicy {
        &self.policy
    }

    /// Execute one call. Special tools may move `state` to `Finished`.
    pub async fn execute(&self, call: &ToolCall, state: &mut AgentState) -> ToolOutcome {
        let name = call.name();
        if name.is_empty() {
            return ToolOutcome::Observation("Error: Invalid command format".into());
        }

        if !self.tools.contains(name) {
            return ToolOutcome::Observation(format!("Error: Unknown tool '{name}'"));
        }

        let args = match parse_arguments(&call.function.arguments) {
            Ok(args) => args,
            Err(e) => {
                error!(
                    tool = %name,
                    arguments = %call.function.arguments,
                    error = %e,
                    "Tool arguments are not valid JSON"
                );
                return ToolOutcome::Observation(format!(
                    "Error: Error parsing arguments for {name}: Invalid JSON format"
                ));
            }
        };

        info!(tool = %name, call_id = %call.id, "Activating tool");
        let start = Instant::now();
        let result = AssertUnwindSafe(self.tools.execute(name, args))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ToolError::Panicked(panic_message(panic.as_ref()))));
        let duration_ms = start.elapsed().as_millis() as u64;

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: name.to_string(),
            success: result.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        match result {
            Ok(ToolOutput::RequiresUserResponse(payload)) => {
                self.event_bus.publish(DomainEvent::UserInputRequested {
                    tool_name: name.to_string(),
                    tool_call_id: call.id.clone(),
                    timestamp: Utc::now(),
                });
                ToolOutcome::SuspendForUserInput(payload)
            }
            Ok(ToolOutput::Value(value)) => {
                let observation = format_observation(name, &value);
                if self.policy.is_special(name) {
                    let finished = self.policy.apply(name, &value, state);
                    self.event_bus.publish(DomainEvent::SpecialToolTriggered {
                        tool_name: name.to_string(),
                        finished,
                        timestamp: Utc::now(),
                    });
                }
                ToolOutcome::Observation(observation)
            }
            Err(e) => {
                let message = format!("Tool '{name}' encountered a problem: {e}");
                error!(tool = %name, error = %e, "Tool execution failed");
                ToolOutcome::Observation(format!("Error: {message}"))
            }
        }
    }
}

/// Parse a tool-call argument string. An empty string means "no arguments".
pub fn parse_arguments(raw: &str) -> Result<serde_json::Value, serde_json::Error> {
    if raw.is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw)
}

/// Render a tool result as the text the model will read.
pub fn format_observation(name: &str, value: &serde_json::Value) -> String {
    if is_empty_result(value) {
        format!("Cmd `{name}` completed with no output")
    } else {
        format!("Observed output of cmd `{name}` executed:\n{}", render_value(value))
    }
}

/// Null, `false`, zero, and empty strings, arrays or objects carry no output.
fn is_empty_result(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Bool(b) => !b,
        serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
