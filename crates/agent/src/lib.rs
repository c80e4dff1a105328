//! The tool-calling agent loop.
//!
//! The agent follows a **Think → Act → Observe** cycle:
//!
//! 1. **Think**: send the conversation and tool definitions to the model
//! 2. **Act**: execute the tool calls it chose, one at a time, in order
//! 3. **Observe**: append every result to the conversation as a tool message
//!
//! A reply that asks the user something in plain text is turned into an
//! `ask_user` call, so the run suspends instead of stalling. The loop ends
//! when a special tool (`terminate` by default) fires, the model's context
//! overflows, or the step limit is reached.

pub mod classifier;
pub mod executor;
pub mod synthesizer;
pub mod toolcall;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use classifier::{QuestionClassifier, QuestionDetector, is_asking_question};
pub use executor::{FinishPredicate, SpecialToolPolicy, ToolExecutor, ToolOutcome};
pub use synthesizer::synthesize_ask_user;
pub use toolcall::{ActOutcome, RunOutcome, ToolCallAgent};
