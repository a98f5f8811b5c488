//! Client configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! backend URL, request timeout, refresh retry schedule, and which store
//! keeps the credential.
//!
//! Configuration is stored at `~/.config/linkori/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::auth::StoreBackend;
use crate::session::RetryPolicy;

/// Application name used for config directory paths
const APP_NAME: &str = "linkori";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend the frontend talks to in development
pub const DEFAULT_API_URL: &str = "https://127.0.0.1:8000";

/// Per-request timeout. A request that exceeds it counts as a failure.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub request_timeout_secs: u64,
    /// Total refresh attempts, including the first.
    pub max_refresh_attempts: u32,
    pub initial_backoff_ms: u64,
    pub store: StoreBackend,
    /// `name=value` cookie seeding the refresh session.
    pub refresh_cookie: Option<String>,
    /// Accept self-signed certificates (local development backends).
    pub accept_invalid_certs: bool,
}

impl Default for Config {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_refresh_attempts: retry.max_attempts,
            initial_backoff_ms: retry.initial_backoff.as_millis() as u64,
            store: StoreBackend::default(),
            refresh_cookie: None,
            accept_invalid_certs: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Host and port of the backend; credentials are scoped to it.
    pub fn origin(&self) -> Result<String> {
        let url = Url::parse(&self.api_url)
            .with_context(|| format!("Invalid API URL: {}", self.api_url))?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("API URL has no host: {}", self.api_url))?;
        Ok(match url.port_or_known_default() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_refresh_attempts,
            Duration::from_millis(self.initial_backoff_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.store, StoreBackend::Keyring);
    }

    #[test]
    fn test_origin() {
        let mut config = Config::default();
        assert_eq!(config.origin().unwrap(), "127.0.0.1:8000");

        config.api_url = "https://linkori.example/app".to_string();
        assert_eq!(config.origin().unwrap(), "linkori.example:443");

        config.api_url = "not a url".to_string();
        assert!(config.origin().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"api_url": "http://localhost:9000", "store": "file"}"#)
            .expect("write");

        let config = Config::load_from(&path).expect("config loads");
        assert_eq!(config.api_url, "http://localhost:9000");
        assert_eq!(config.store, StoreBackend::File);
        assert_eq!(config.max_refresh_attempts, 4);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = Config {
            refresh_cookie: Some("refresh=abc".to_string()),
            ..Config::default()
        };
        config.save_to(&path).expect("config saves");
        assert_eq!(Config::load_from(&path).expect("config loads"), config);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).expect("config loads");
        assert_eq!(config, Config::default());
    }
}
