//! HTTP utilities for TrueNAS REST API calls

use super::connection::TransportResult;
use crate::error::Result;
use anyhow::Context;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Per-request timeout. The reconcilers never retry, so this bounds a whole run.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Decode a response body. TrueNAS answers most calls with JSON but some
/// validation failures come back as plain text.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// HTTP client wrapper for TrueNAS API calls
#[derive(Clone)]
pub struct TruenasHttpClient {
    client: Client,
}

impl TruenasHttpClient {
    /// Create a new HTTP client
    ///
    /// `verify_tls` set to false accepts self-signed certificates, which is
    /// how most appliances ship.
    pub fn new(verify_tls: bool) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("truenas-api/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Send one request and return the status and decoded body.
    ///
    /// Non-success statuses are returned, not raised.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        api_key: Option<&str>,
        payload: Option<&Value>,
    ) -> Result<TransportResult> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);

        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }

        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_server_error() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
        } else if !status.is_success() {
            tracing::debug!("API returned {} - {}", status, sanitize_for_log(&text));
        }

        Ok(TransportResult::new(status.as_u16(), parse_body(&text)))
    }
}
