//! Builds the synthetic `ask_user` call for a reply that asked a question
//! in plain text.

use toolloop_core::message::ToolCall;
use toolloop_tools::{ASK_USER_TOOL, AskUserArgs};
use tracing::error;

/// Id given to every synthesized ask-user call.
pub const SYNTHETIC_CALL_ID: &str = "auto_ask_user";

/// Questions longer than this many characters are cut short.
pub const MAX_QUESTION_CHARS: usize = 500;

/// Appended to a question that was cut short.
pub const TRUNCATION_MARKER: &str = "...";

/// Used when the real question cannot be encoded.
pub const FALLBACK_QUESTION: &str = "I need more information to proceed. Please provide details.";

/// Turn `question` into a single `ask_user` tool call.
///
/// Returns an empty list if no well-formed call can be built; callers treat
/// that as "no question detected".
pub fn synthesize_ask_user(question: &str) -> Vec<ToolCall> {
    let question = sanitize_question(question);

    let arguments = match encode_args(&question) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "Failed to encode ask_user arguments, using fallback question");
            match encode_args(FALLBACK_QUESTION) {
                Ok(json) => json,
                Err(e) => {
                    error!(error = %e, "Failed to encode fallback ask_user arguments");
                    return Vec::new();
                }
            }
        }
    };

    vec![ToolCall::function(SYNTHETIC_CALL_ID, ASK_USER_TOOL, arguments)]
}

/// Bound the length and flatten line breaks so the question travels as one line.
fn sanitize_question(question: &str) -> String {
    let text = match question.char_indices().nth(MAX_QUESTION_CHARS) {
        Some((idx, _)) => format!("{}{TRUNCATION_MARKER}", &question[..idx]),
        None => question.to_string(),
    };
    text.replace(['\n', '\r'], " ")
}

fn encode_args(question: &str) -> Result<String, serde_json::Error> {
    serde_json::to_string(&AskUserArgs::follow_up(question))
}
