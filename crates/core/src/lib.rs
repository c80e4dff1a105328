//! # toolloop Core
//!
//! Domain types, traits, and error definitions for the toolloop agent
//! control loop. This crate defines the model that the tools and agent
//! crates implement against.
//!
//! ## Design Philosophy
//!
//! The two external collaborators of the loop, the LLM endpoint and the
//! executable tools, are traits here. Implementations live elsewhere, which
//! keeps the loop testable with scripted providers and stub tools.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod agent;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use message::{Conversation, ConversationId, FunctionCall, Message, Role, ToolCall};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolOutput, ToolRegistry};
pub use agent::{AgentState, ToolChoice};
pub use event::{DomainEvent, EventBus};
