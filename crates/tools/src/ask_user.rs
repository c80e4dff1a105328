//! Ask-user tool: suspends the run until the user answers.
//!
//! The tool itself does no I/O. It validates the question and hands a
//! `requires_user_response` payload back to the loop, which yields control
//! to whoever drives the agent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use toolloop_core::error::ToolError;
use toolloop_core::tool::{Tool, ToolOutput};
use tracing::debug;

/// Name the loop uses to recognise this tool.
pub const ASK_USER_TOOL: &str = "ask_user";

/// Arguments accepted by [`AskUserTool`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskUserArgs {
    /// The question to put to the user
    pub question: String,

    /// Whether answering yes lets the agent do something destructive
    #[serde(default)]
    pub dangerous_action: bool,

    /// Free-form category, e.g. "follow-up" or "confirmation"
    #[serde(default = "default_question_type")]
    pub question_type: String,
}

fn default_question_type() -> String {
    "follow-up".into()
}

impl AskUserArgs {
    /// A non-dangerous follow-up question.
    pub fn follow_up(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            dangerous_action: false,
            question_type: default_question_type(),
        }
    }
}

pub struct AskUserTool;

#[async_trait]
impl Tool for AskUserTool {
    fn name(&self) -> &str {
        ASK_USER_TOOL
    }

    fn description(&self) -> &str {
        "Ask the user a question and wait for the answer. Use this when you need information or confirmation that only the user can provide."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to ask the user"
                },
                "dangerous_action": {
                    "type": "boolean",
                    "description": "Set to true when the answer authorises a destructive or irreversible action"
                },
                "question_type": {
                    "type": "string",
                    "description": "Kind of question, e.g. 'follow-up', 'confirmation', 'choice'"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let args: AskUserArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(format!("ask_user: {e}")))?;

        if args.question.trim().is_empty() {
            return Err(ToolError::InvalidArguments(
                "ask_user: 'question' must not be empty".into(),
            ));
        }

        debug!(question_type = %args.question_type, dangerous = args.dangerous_action, "Requesting user input");

        Ok(ToolOutput::RequiresUserResponse(serde_json::json!({
            "requires_user_response": true,
            "question": args.question,
            "dangerous_action": args.dangerous_action,
            "question_type": args.question_type,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_suspend_payload() {
        let result = AskUserTool
            .execute(serde_json::json!({"question": "Which branch?"}))
            .await
            .unwrap();

        match result {
            ToolOutput::RequiresUserResponse(payload) => {
                assert_eq!(payload["requires_user_response"], true);
                assert_eq!(payload["question"], "Which branch?");
                assert_eq!(payload["question_type"], "follow-up");
                assert_eq!(payload["dangerous_action"], false);
            }
            other => panic!("Expected RequiresUserResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dangerous_flag_is_preserved() {
        let result = AskUserTool
            .execute(serde_json::json!({
                "question": "Delete the build directory?",
                "dangerous_action": true,
                "question_type": "confirmation"
            }))
            .await
            .unwrap();
        let ToolOutput::RequiresUserResponse(payload) = result else {
            panic!("Expected RequiresUserResponse");
        };
        assert_eq!(payload["dangerous_action"], true);
        assert_eq!(payload["question_type"], "confirmation");
    }

    #[tokio::test]
    async fn missing_question_is_invalid() {
        let err = AskUserTool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn blank_question_is_invalid() {
        let err = AskUserTool
            .execute(serde_json::json!({"question": "   "}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn follow_up_args_shape() {
        let json = serde_json::to_value(AskUserArgs::follow_up("Proceed?")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "question": "Proceed?",
                "dangerous_action": false,
                "question_type": "follow-up"
            })
        );
    }
}
