//! Response Classifier
//!
//! Maps a raw [`TransportResult`] onto a small closed set of outcomes. The
//! outcomes a reconciler can branch on are returned; the rest are raised as
//! [`Error`]s.

use crate::error::{Error, Result};
use crate::truenas::connection::{TransportResult, HTTP_NOT_FOUND};
use serde_json::Value;

/// What kind of call produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Read used for branching; not-found is an expected answer
    Lookup,
    /// Create, update or delete
    Mutation,
}

/// Non-fatal classification of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    NotFound,
    /// The API refused a mutation (validation error, conflict, ...)
    Rejected,
}

/// Classify a transport result for the given kind of call.
pub fn classify(result: &TransportResult, kind: CallKind) -> Result<Outcome> {
    let code = result.status_code;

    if result.is_success() {
        return Ok(Outcome::Success);
    }

    match kind {
        CallKind::Lookup if code == HTTP_NOT_FOUND => Ok(Outcome::NotFound),
        CallKind::Mutation if code < 500 => {
            tracing::warn!("API rejected request with status {}", code);
            Ok(Outcome::Rejected)
        }
        _ => Err(Error::Server {
            code,
            body: result.body.clone(),
        }),
    }
}

/// Extract the identifier field from a found record.
pub fn extract_id(body: &Value, id_field: &str) -> Result<String> {
    match body.get(id_field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(Error::unexpected(format!(
            "found record has no usable '{}' field: {}",
            id_field, body
        ))),
    }
}
