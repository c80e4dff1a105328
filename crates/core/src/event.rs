//! Domain event system: the loop's structured observability sink.
//!
//! The agent publishes an event whenever it makes a decision worth
//! inspecting: what the model said, which tools ran, why the run ended.
//! Subscribers (metrics, UIs, tests) react without coupling to the loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::agent::AgentState;

/// All domain events emitted by the control loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The model answered a think step
    ThoughtRecorded {
        agent: String,
        content_preview: String,
        tool_names: Vec<String>,
        tokens_used: Option<u32>,
        timestamp: DateTime<Utc>,
    },

    /// Free text was classified as a question and turned into an ask-user call
    QuestionDetected {
        agent: String,
        question_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A tool asked for user input and the turn was suspended
    UserInputRequested {
        tool_name: String,
        tool_call_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A special tool was invoked
    SpecialToolTriggered {
        tool_name: String,
        finished: bool,
        timestamp: DateTime<Utc>,
    },

    /// The completion endpoint reported that the context is too large
    TokenLimitReached {
        agent: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// Agent state changed
    StateChanged {
        agent: String,
        from: AgentState,
        to: AgentState,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Shorten `text` to at most `max` characters for event payloads.
pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
