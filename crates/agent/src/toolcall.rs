//! The tool-calling agent: think → act → observe.
//!
//! Each step asks the model what to do (`think`), runs whatever tools it
//! chose (`act`), and records everything in the conversation so the next
//! step sees the results. A run ends when a special tool such as
//! `terminate` fires, the context overflows, or the step limit is reached.
//! A tool that needs the user suspends the run until [`ToolCallAgent::resume`].

use std::sync::Arc;

use chrono::Utc;
use toolloop_config::AgentSettings;
use toolloop_core::agent::{AgentState, ToolChoice};
use toolloop_core::error::{Error, ProviderError, Result};
use toolloop_core::event::{DomainEvent, EventBus, preview};
use toolloop_core::message::{Conversation, Message, Role, ToolCall};
use toolloop_core::provider::{Provider, ProviderRequest};
use toolloop_core::tool::ToolRegistry;
use tracing::{debug, error, info, warn};

use crate::classifier::{QuestionClassifier, QuestionDetector};
use crate::executor::{SpecialToolPolicy, ToolExecutor, ToolOutcome};
use crate::synthesizer::synthesize_ask_user;

/// Content of the assistant message that carries a synthesized ask-user call.
const ASK_USER_NOTICE: &str = "I need to get more information from you";

/// Returned by `act` when there is nothing to execute and nothing to echo.
const NO_CONTENT: &str = "No content or commands to execute";

/// Returned by `step` when the model chose not to act.
const NO_ACTION: &str = "Thinking complete - no action needed";

/// Prefixed to the next-step prompt when the model keeps repeating itself.
const STUCK_PROMPT: &str = "Observed duplicate responses. Consider new strategies and avoid repeating ineffective paths already attempted.";

const PREVIEW_CHARS: usize = 200;

/// Result of one act phase (and therefore of one step).
#[derive(Debug, Clone, PartialEq)]
pub enum ActOutcome {
    /// Observations of every executed call, separated by blank lines, or the
    /// echoed assistant content when no tools were called.
    Completed(String),
    /// A tool needs the user. Remaining calls of the turn were not executed.
    AwaitingUser(serde_json::Value),
}

/// Result of [`ToolCallAgent::run`] and [`ToolCallAgent::resume`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The loop stopped. `finished` is true when a special tool or the
    /// token limit ended it, false when the step limit did.
    Completed { summary: String, finished: bool },
    /// The run is suspended until [`ToolCallAgent::resume`] is called.
    AwaitingUser(serde_json::Value),
}

/// An agent that drives a model through tool calls.
pub struct ToolCallAgent {
    name: String,
    description: String,

    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,

    system_prompt: Option<String>,
    next_step_prompt: Option<String>,
    tool_choice: ToolChoice,

    executor: ToolExecutor,
    classifier: Box<dyn QuestionDetector>,
    event_bus: Arc<EventBus>,

    memory: Conversation,
    state: AgentState,
    tool_calls: Vec<ToolCall>,

    max_steps: u32,
    current_step: u32,
    max_observe: Option<usize>,
    duplicate_threshold: usize,
    step_results: Vec<String>,
    awaiting_user: bool,
}

impl ToolCallAgent {
    /// Create an agent with default settings.
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self::build(
            &AgentSettings::default(),
            Box::new(QuestionClassifier::default()),
            provider,
            tools,
            event_bus,
        )
    }

    /// Create an agent from loaded settings.
    pub fn from_settings(
        settings: &AgentSettings,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        let classifier = QuestionClassifier::default()
            .with_patterns(settings.question_patterns.iter().map(String::as_str))
            .map_err(|e| Error::Config {
                message: format!("invalid question pattern: {e}"),
            })?;
        Ok(Self::build(settings, Box::new(classifier), provider, tools, event_bus))
    }

    fn build(
        settings: &AgentSettings,
        classifier: Box<dyn QuestionDetector>,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let policy = SpecialToolPolicy::new(settings.special_tool_names.iter().cloned());
        Self {
            name: settings.name.clone(),
            description: settings.description.clone(),
            provider,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            system_prompt: settings.system_prompt().map(str::to_string),
            next_step_prompt: settings.next_step_prompt().map(str::to_string),
            tool_choice: settings.tool_choice,
            executor: ToolExecutor::new(tools, policy, event_bus.clone()),
            classifier,
            event_bus,
            memory: Conversation::new(),
            state: AgentState::Idle,
            tool_calls: Vec::new(),
            max_steps: settings.max_steps,
            current_step: 0,
            max_observe: settings.max_observe.filter(|max| *max > 0),
            duplicate_threshold: settings.duplicate_threshold,
            step_results: Vec::new(),
            awaiting_user: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the system prompt. An empty string disables it.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into()).filter(|p| !p.is_empty());
        self
    }

    /// Set the instruction pushed before each think step. An empty string disables it.
    pub fn with_next_step_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.next_step_prompt = Some(prompt.into()).filter(|p| !p.is_empty());
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    pub fn with_special_tool_policy(mut self, policy: SpecialToolPolicy) -> Self {
        self.executor = self.executor.with_policy(policy);
        self
    }

    pub fn with_classifier(mut self, classifier: Box<dyn QuestionDetector>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max;
        self
    }

    /// Truncate each tool observation to `max` characters. Zero means no limit.
    pub fn with_max_observe(mut self, max: usize) -> Self {
        self.max_observe = (max > 0).then_some(max);
        self
    }

    /// Start from an existing conversation instead of an empty one.
    pub fn with_memory(mut self, memory: Conversation) -> Self {
        self.memory = memory;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn memory(&self) -> &Conversation {
        &self.memory
    }

    /// Tool calls chosen by the last think step.
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn next_step_prompt(&self) -> Option<&str> {
        self.next_step_prompt.as_deref()
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    /// Whether the last act phase suspended for user input.
    pub fn is_awaiting_user(&self) -> bool {
        self.awaiting_user
    }

    fn set_state(&mut self, to: AgentState) {
        let from = self.state;
        self.state = to;
        self.publish_state_change(from, to);
    }

    fn publish_state_change(&self, from: AgentState, to: AgentState) {
        if from == to {
            return;
        }
        debug!(agent = %self.name, %from, %to, "Agent state changed");
        self.event_bus.publish(DomainEvent::StateChanged {
            agent: self.name.clone(),
            from,
            to,
            timestamp: Utc::now(),
        });
    }

    /// Ask the model for the next move and record its answer.
    ///
    /// Returns whether [`act`](Self::act) has anything to do.
    pub async fn think(&mut self) -> Result<bool> {
        if let Some(prompt) = &self.next_step_prompt {
            self.memory.push(Message::user(prompt.clone()));
        }

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: self.memory.messages().to_vec(),
            system: self.system_prompt.iter().map(|p| Message::system(p.as_str())).collect(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.executor.tools().definitions(),
            tool_choice: self.tool_choice,
        };

        let response = match self.provider.complete(request).await {
            Ok(response) => response,
            Err(e @ ProviderError::InvalidRequest(_)) => return Err(e.into()),
            Err(e) => {
                if let Some(cause) = e.token_limit_cause() {
                    error!(agent = %self.name, error = %cause, "Token limit reached");
                    self.event_bus.publish(DomainEvent::TokenLimitReached {
                        agent: self.name.clone(),
                        error_message: cause.to_string(),
                        timestamp: Utc::now(),
                    });
                    self.memory.push(Message::assistant(format!(
                        "Maximum token limit reached, cannot continue execution: {cause}"
                    )));
                    self.set_state(AgentState::Finished);
                    return Ok(false);
                }
                return Err(e.into());
            }
        };

        let content = response.message.content.filter(|c| !c.is_empty());
        let tool_calls = response.message.tool_calls;
        let tool_names: Vec<String> = tool_calls.iter().map(|c| c.name().to_string()).collect();

        info!(agent = %self.name, thoughts = ?content, "Model responded");
        info!(agent = %self.name, count = tool_calls.len(), tools = ?tool_names, "Tools selected");
        self.event_bus.publish(DomainEvent::ThoughtRecorded {
            agent: self.name.clone(),
            content_preview: preview(content.as_deref().unwrap_or_default(), PREVIEW_CHARS),
            tool_names,
            tokens_used: response.usage.as_ref().map(|u| u.total_tokens),
            timestamp: Utc::now(),
        });

        if self.tool_choice == ToolChoice::None {
            if !tool_calls.is_empty() {
                warn!(agent = %self.name, "Model tried to use tools when they weren't available");
            }
            self.tool_calls.clear();
            return match content {
                Some(text) => {
                    self.memory.push(Message::assistant(text));
                    Ok(true)
                }
                None => Ok(false),
            };
        }

        if tool_calls.is_empty()
            && let Some(text) = content.as_deref()
            && self.classifier.is_question(text)
        {
            let synthesized = synthesize_ask_user(text);
            if synthesized.is_empty() {
                warn!(agent = %self.name, "Could not build ask_user call, treating reply as plain content");
            } else {
                info!(agent = %self.name, question = %text, "Converting question to ask_user tool call");
                self.event_bus.publish(DomainEvent::QuestionDetected {
                    agent: self.name.clone(),
                    question_preview: preview(text, PREVIEW_CHARS),
                    timestamp: Utc::now(),
                });
                self.memory.push(Message::from_tool_calls(
                    Some(ASK_USER_NOTICE.into()),
                    synthesized.clone(),
                ));
                self.tool_calls = synthesized;
                return Ok(true);
            }
        }

        self.memory
            .push(Message::from_tool_calls(content.clone(), tool_calls.clone()));
        self.tool_calls = tool_calls;

        let has_calls = !self.tool_calls.is_empty();
        Ok(match self.tool_choice {
            // act() reports the contract violation
            ToolChoice::Required if !has_calls => true,
            ToolChoice::Auto if !has_calls => content.is_some(),
            _ => has_calls,
        })
    }

    /// Execute the tool calls chosen by the last think step, in order.
    pub async fn act(&mut self) -> Result<ActOutcome> {
        if self.tool_calls.is_empty() {
            if self.tool_choice == ToolChoice::Required {
                return Err(Error::ToolCallsRequired);
            }
            let text = self
                .memory
                .last()
                .and_then(|m| m.content.clone())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| NO_CONTENT.to_string());
            return Ok(ActOutcome::Completed(text));
        }

        let calls = self.tool_calls.clone();
        let mut results = Vec::with_capacity(calls.len());

        for call in &calls {
            let before = self.state;
            let outcome = self.executor.execute(call, &mut self.state).await;
            self.publish_state_change(before, self.state);

            match outcome {
                ToolOutcome::SuspendForUserInput(payload) => {
                    info!(agent = %self.name, tool = %call.name(), "Waiting for user input");
                    self.memory
                        .push(Message::tool_result(&call.id, call.name(), payload.to_string()));
                    self.awaiting_user = true;
                    return Ok(ActOutcome::AwaitingUser(payload));
                }
                ToolOutcome::Observation(observation) => {
                    let observation = match self.max_observe {
                        Some(max) => truncate_chars(&observation, max),
                        None => observation,
                    };
                    info!(
                        agent = %self.name,
                        tool = %call.name(),
                        result = %preview(&observation, PREVIEW_CHARS),
                        "Tool completed"
                    );
                    self.memory
                        .push(Message::tool_result(&call.id, call.name(), observation.clone()));
                    results.push(observation);
                }
            }
        }

        Ok(ActOutcome::Completed(results.join("\n\n")))
    }

    /// One think + act cycle.
    pub async fn step(&mut self) -> Result<ActOutcome> {
        if !self.think().await? {
            return Ok(ActOutcome::Completed(NO_ACTION.into()));
        }
        self.act().await
    }

    /// Run the agent on a new request until it finishes, suspends, or hits
    /// the step limit.
    ///
    /// The agent must be idle (or recovering from an error). The state is
    /// back to `Idle` once the run completes.
    pub async fn run(&mut self, request: &str) -> Result<RunOutcome> {
        if !matches!(self.state, AgentState::Idle | AgentState::Error) {
            return Err(Error::Internal(format!(
                "Cannot run agent from state: {}",
                self.state
            )));
        }

        self.memory.push(Message::user(request));
        self.current_step = 0;
        self.step_results.clear();
        self.set_state(AgentState::Running);
        self.drive(false).await
    }

    /// Continue a suspended run with the user's answer.
    ///
    /// The model always gets one step to read the answer, even when the run
    /// was suspended on its last allowed step.
    pub async fn resume(&mut self, answer: &str) -> Result<RunOutcome> {
        if !self.awaiting_user || self.state != AgentState::Running {
            return Err(Error::Internal(format!(
                "Agent '{}' is not waiting for user input",
                self.name
            )));
        }

        self.awaiting_user = false;
        self.memory.push(Message::user(answer));
        self.drive(true).await
    }

    async fn drive(&mut self, resuming: bool) -> Result<RunOutcome> {
        let mut force_step = resuming;
        while (force_step || self.current_step < self.max_steps) && !self.state.is_finished() {
            force_step = false;
            self.current_step += 1;
            info!(agent = %self.name, step = self.current_step, max_steps = self.max_steps, "Executing step");

            let outcome = match self.step().await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(agent = %self.name, error = %e, "Step failed");
                    self.event_bus.publish(DomainEvent::ErrorOccurred {
                        context: format!("{} step {}", self.name, self.current_step),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    self.set_state(AgentState::Error);
                    return Err(e);
                }
            };

            if self.is_stuck() {
                self.handle_stuck_state();
            }

            match outcome {
                ActOutcome::Completed(result) => {
                    self.step_results
                        .push(format!("Step {}: {}", self.current_step, result));
                }
                ActOutcome::AwaitingUser(payload) => {
                    return Ok(RunOutcome::AwaitingUser(payload));
                }
            }
        }

        let finished = self.state.is_finished();
        if !finished {
            warn!(agent = %self.name, max_steps = self.max_steps, "Max steps reached");
            self.step_results
                .push(format!("Terminated: Reached max steps ({})", self.max_steps));
        }

        self.current_step = 0;
        self.set_state(AgentState::Idle);

        let summary = if self.step_results.is_empty() {
            "No steps executed".to_string()
        } else {
            std::mem::take(&mut self.step_results).join("\n")
        };
        Ok(RunOutcome::Completed { summary, finished })
    }

    /// Whether the latest reply repeats earlier assistant replies
    /// `duplicate_threshold` or more times.
    fn is_stuck(&self) -> bool {
        let messages = self.memory.messages();
        let Some((last, earlier)) = messages.split_last() else {
            return false;
        };
        let Some(content) = last.content.as_deref().filter(|c| !c.is_empty()) else {
            return false;
        };

        let duplicates = earlier
            .iter()
            .filter(|m| m.role == Role::Assistant && m.content.as_deref() == Some(content))
            .count();
        duplicates >= self.duplicate_threshold
    }

    fn handle_stuck_state(&mut self) {
        warn!(agent = %self.name, "Agent detected stuck state, adding prompt");
        self.next_step_prompt = match self.next_step_prompt.take() {
            Some(p) if p.starts_with(STUCK_PROMPT) => Some(p),
            Some(p) => Some(format!("{STUCK_PROMPT}\n{p}")),
            None => Some(STUCK_PROMPT.to_string()),
        };
    }
}

/// Keep the first `max` characters of `text`.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
