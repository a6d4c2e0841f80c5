//! Connection boundary
//!
//! The reconcilers never talk HTTP directly. They hand a method, an API path
//! and an optional JSON payload to a [`Connection`] and get back the raw
//! status code and body.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const HTTP_OK: u16 = 200;
pub const HTTP_NOT_FOUND: u16 = 404;

/// Status code and body of one API call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportResult {
    pub status_code: u16,
    #[serde(default)]
    pub body: Value,
}

impl TransportResult {
    pub fn new(status_code: u16, body: Value) -> Self {
        Self { status_code, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(HTTP_OK, body)
    }

    pub fn not_found() -> Self {
        Self::new(HTTP_NOT_FOUND, Value::Null)
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == HTTP_OK
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Parse a raw `{status_code, body}` record handed over by a connection
    /// that speaks plain JSON.
    pub fn from_value(value: Value) -> Result<Self> {
        let Some(obj) = value.as_object() else {
            return Err(Error::unexpected(format!(
                "expected a response object, got: {}",
                value
            )));
        };

        let status_code = obj
            .get("status_code")
            .and_then(|v| v.as_u64())
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| {
                Error::unexpected(format!("response is missing a status_code field: {}", value))
            })?;

        let body = obj.get("body").cloned().unwrap_or(Value::Null);

        Ok(Self { status_code, body })
    }
}

/// Request/response transport to the TrueNAS API.
///
/// Implementations return every HTTP status as a [`TransportResult`]; only
/// transport failures become [`Error::Connection`]. Classification is left to
/// the caller.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn send_request(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<TransportResult>;
}
