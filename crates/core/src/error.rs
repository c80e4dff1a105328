//! Error types for the toolloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all toolloop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Loop contract ---
    /// The tool choice is `Required` but the model produced no tool calls.
    #[error("Tool calls required but none provided")]
    ToolCallsRequired,

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The request itself is malformed. Never retried, never absorbed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Token limit exceeded: {message}")]
    TokenLimitExceeded { message: String },

    /// A retrying transport gave up; the last failure is kept as the source.
    #[error("Request failed after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ProviderError>,
    },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Find a token-limit failure in this error or in any error it wraps.
    pub fn token_limit_cause(&self) -> Option<&ProviderError> {
        match self {
            Self::TokenLimitExceeded { .. } => Some(self),
            Self::RetriesExhausted { source, .. } => source.token_limit_cause(),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool panicked: {0}")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::ExecutionFailed {
            tool_name: "shell".into(),
            reason: "exit status 2".into(),
        });
        assert!(err.to_string().contains("shell"));
        assert!(err.to_string().contains("exit status 2"));
    }

    #[test]
    fn token_limit_found_directly() {
        let err = ProviderError::TokenLimitExceeded {
            message: "128000 tokens".into(),
        };
        assert!(err.token_limit_cause().is_some());
    }

    #[test]
    fn token_limit_found_through_retry_wrapper() {
        let err = ProviderError::RetriesExhausted {
            attempts: 3,
            source: Box::new(ProviderError::TokenLimitExceeded {
                message: "context too long".into(),
            }),
        };
        let cause = err.token_limit_cause().unwrap();
        assert!(cause.to_string().contains("context too long"));
    }

    #[test]
    fn token_limit_found_through_nested_wrappers() {
        let err = ProviderError::RetriesExhausted {
            attempts: 2,
            source: Box::new(ProviderError::RetriesExhausted {
                attempts: 3,
                source: Box::new(ProviderError::TokenLimitExceeded {
                    message: "prompt is 210000 tokens".into(),
                }),
            }),
        };
        let cause = err.token_limit_cause().unwrap();
        assert!(matches!(cause, ProviderError::TokenLimitExceeded { .. }));
    }

    #[test]
    fn other_errors_have_no_token_limit_cause() {
        let err = ProviderError::RetriesExhausted {
            attempts: 3,
            source: Box::new(ProviderError::Network("connection reset".into())),
        };
        assert!(err.token_limit_cause().is_none());
        assert!(ProviderError::Timeout("30s".into()).token_limit_cause().is_none());
    }

    #[test]
    fn tool_calls_required_message() {
        assert_eq!(
            Error::ToolCallsRequired.to_string(),
            "Tool calls required but none provided"
        );
    }
}
