//! OpenAI client error types.

use thiserror::Error;

/// Result type for OpenAI operations.
pub type OpenAiResult<T> = Result<T, OpenAiError>;

/// Errors that can occur while talking to the OpenAI API.
#[derive(Debug, Error)]
pub enum OpenAiError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("OpenAI API error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Failed to parse a response body.
    #[error("failed to parse response: {0}")]
    ParseError(String),
}
