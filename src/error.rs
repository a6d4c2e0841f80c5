//! Error types for truenas-api.
//!
//! Every failure an invocation can hit falls into one of four kinds. None of
//! them are retried; they are surfaced to the caller as-is.

use serde_json::Value;
use thiserror::Error;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reconciling a resource
#[derive(Debug, Error)]
pub enum Error {
    /// The server reported a fault (5xx, or a non-2xx on a lookup)
    #[error("Server returned an error, status code: {code}. Server response: {body}")]
    Server { code: u16, body: Value },

    /// The desired-state record failed validation before any call was made
    #[error("Data model error: {0}")]
    Model(String),

    /// A nominally successful response did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Transport-level failure
    #[error("Connection error: {0}")]
    Connection(#[from] reqwest::Error),
}

impl Error {
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedResponse(message.into())
    }
}
