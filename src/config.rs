//! Configuration Management
//!
//! Handles persistent connection settings for truenas-api.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the base URL
pub const ENV_URL: &str = "TRUENAS_URL";
/// Environment variable overriding the API key
pub const ENV_API_KEY: &str = "TRUENAS_API_KEY";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the appliance, e.g. `https://nas.local`
    #[serde(default)]
    pub base_url: Option<String>,
    /// API key sent as a bearer token
    #[serde(default)]
    pub api_key: Option<String>,
    /// Verify the server certificate
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
}

fn default_verify_tls() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            verify_tls: default_verify_tls(),
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("truenas-api").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_json(&content),
            Err(e) => {
                tracing::warn!("Failed to read {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    fn from_json(content: &str) -> Self {
        serde_json::from_str(content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed config file: {}", e);
            Self::default()
        })
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Merge settings given on the command line; unset values keep what is stored
    pub fn update(
        &mut self,
        base_url: Option<String>,
        api_key: Option<String>,
        verify_tls: Option<bool>,
    ) {
        if let Some(url) = base_url {
            self.base_url = Some(url);
        }
        if let Some(key) = api_key {
            self.api_key = Some(key);
        }
        if let Some(verify) = verify_tls {
            self.verify_tls = verify;
        }
    }

    /// Get effective base URL (CLI > environment > config)
    pub fn effective_base_url(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| non_empty_env(ENV_URL))
            .or_else(|| self.base_url.clone())
    }

    /// Get effective API key (environment > config)
    pub fn effective_api_key(&self) -> Option<String> {
        non_empty_env(ENV_API_KEY).or_else(|| self.api_key.clone())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
