//! TrueNAS Client
//!
//! Main client for interacting with the TrueNAS REST API, combining the
//! base URL, API key and HTTP functionality.

use super::connection::{Connection, TransportResult};
use super::http::TruenasHttpClient;
use crate::error::Result;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use url::Url;

/// Path prefix of the v2.0 REST API
const API_PREFIX: &str = "api/v2.0";

/// Main TrueNAS client
#[derive(Clone)]
pub struct TruenasClient {
    pub http: TruenasHttpClient,
    pub base_url: Url,
    api_key: Option<String>,
}

impl TruenasClient {
    /// Create a new TrueNAS client
    pub fn new(base_url: &str, api_key: Option<&str>, verify_tls: bool) -> anyhow::Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let http = TruenasHttpClient::new(verify_tls)?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.map(str::to_string),
        })
    }

    /// Build a full API URL from a path relative to `/api/v2.0/`
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            API_PREFIX,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Connection for TruenasClient {
    async fn send_request(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<TransportResult> {
        let url = self.api_url(path);
        self.http
            .send(method, &url, self.api_key.as_deref(), payload)
            .await
    }
}

/// Parse the base URL and make sure it ends with a slash so joins keep any
/// path prefix (reverse proxies often mount the UI under one).
fn normalize_base_url(raw: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(raw).with_context(|| format!("Invalid TrueNAS URL: {}", raw))?;

    if url.cannot_be_a_base() {
        anyhow::bail!("TrueNAS URL cannot be used as a base: {}", raw);
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_adds_prefix() {
        let client = TruenasClient::new("https://nas.local", None, true).unwrap();
        assert_eq!(
            client.api_url("user/id/5"),
            "https://nas.local/api/v2.0/user/id/5"
        );
    }

    #[test]
    fn test_api_url_keeps_base_path() {
        let client = TruenasClient::new("https://proxy.example/truenas", None, true).unwrap();
        assert_eq!(
            client.api_url("/jail/fstab"),
            "https://proxy.example/truenas/api/v2.0/jail/fstab"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(TruenasClient::new("not a url", None, true).is_err());
    }
}
