//! Built-in loop-control tools for toolloop.
//!
//! Only the tools the control loop itself reacts to live here:
//! `terminate` ends a run, `ask_user` suspends it for user input.
//! Everything else is registered by the embedding application.

pub mod ask_user;
pub mod terminate;

use toolloop_core::tool::ToolRegistry;

pub use ask_user::{ASK_USER_TOOL, AskUserArgs, AskUserTool};
pub use terminate::{TERMINATE_TOOL, TerminateTool};

/// Create a registry holding the built-in loop-control tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(terminate::TerminateTool));
    registry.register(Box::new(ask_user::AskUserTool));
    registry
}
