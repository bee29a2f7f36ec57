//! Error types shared across the refinement pipeline.
//!
//! Defines the error types that cross subsystem boundaries:
//! - LLM API interactions (generator transport)
//! - Sandbox execution failures that escape the executor client
//! - Malformed generator replies
//!
//! Errors that only concern one subsystem (`PipelineError`, `GeneratorError`,
//! `ConfigError`, `DatabaseError`) live next to the code that raises them.

use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: LLM_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Empty response from model '{0}'")]
    EmptyResponse(String),
}

/// Errors that escape the sandbox executor client.
///
/// Ordinary transport failures (timeouts, non-2xx, malformed bodies) are
/// folded into an `ExecutionResult` and never surface as this type.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Execution permit unavailable: {0}")]
    PermitUnavailable(String),

    #[error("Unexpected executor failure: {0}")]
    Internal(String),
}

/// A generator reply that does not follow the required structure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("Response format invalid: missing {marker} section")]
    MissingMarker { marker: &'static str },

    #[error("Response format invalid: {code} section appears before {reasoning} section")]
    MarkersOutOfOrder {
        reasoning: &'static str,
        code: &'static str,
    },

    #[error("Response format invalid: no fenced code block after {marker}")]
    MissingCodeBlock { marker: &'static str },

    #[error("Response format invalid: fenced code block is empty")]
    EmptyCodeBlock,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::ApiError {
            code: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "API error (503): overloaded");

        let err = LlmError::EmptyResponse("gemma2-9b-it".to_string());
        assert!(err.to_string().contains("gemma2-9b-it"));
    }

    #[test]
    fn test_format_error_display() {
        let err = FormatError::MissingMarker {
            marker: "CHAIN_OF_THOUGHT:",
        };
        assert!(err.to_string().contains("CHAIN_OF_THOUGHT:"));

        let err = FormatError::MissingCodeBlock { marker: "CODE:" };
        assert!(err.to_string().contains("no fenced code block"));
    }
}
