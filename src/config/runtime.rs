//! # Runtime Configuration
//!
//! Process-level settings loaded from environment variables. These never
//! live in the YAML file because they carry credentials or differ per
//! deployment rather than per token set.

use crate::constants::{DEFAULT_LINODE_API_URL, DEFAULT_METRICS_PORT};
use std::fmt;

#[derive(Clone)]
pub struct RuntimeConfig {
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Overrides `observability.log_format` when set
    pub log_format: Option<String>,
    /// Personal access token used to call the Linode API
    pub linode_token: Option<String>,
    /// Linode API base URL, overridable for testing against a mock API
    pub linode_api_url: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            log_format: None,
            linode_token: None,
            linode_api_url: DEFAULT_LINODE_API_URL.to_string(),
        }
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("metrics_port", &self.metrics_port)
            .field("log_format", &self.log_format)
            .field("linode_token", &self.linode_token.as_ref().map(|_| "<redacted>"))
            .field("linode_api_url", &self.linode_api_url)
            .finish()
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            metrics_port: non_empty("METRICS_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_METRICS_PORT),
            log_format: non_empty("LOG_FORMAT").map(|v| v.trim().to_lowercase()),
            linode_token: non_empty("LINODE_TOKEN"),
            linode_api_url: non_empty("LINODE_API_URL")
                .map_or_else(|| DEFAULT_LINODE_API_URL.to_string(), |v| v.trim_end_matches('/').to_string()),
        }
    }
}
