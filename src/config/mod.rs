//! Startup configuration and the client-side preference cache.

pub mod preferences;

use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use preferences::{app_data_dir, DashboardFilters, PreferenceStore, Theme};

pub const GATEWAY_URL_VAR: &str = "FAMILY_BUDGET_GATEWAY_URL";
pub const GATEWAY_KEY_VAR: &str = "FAMILY_BUDGET_GATEWAY_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Endpoint and public key of the managed backend. Both are required.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub url: String,
    pub api_key: String,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads both settings through `lookup`; fails on the first missing or
    /// malformed value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = required(&lookup, GATEWAY_URL_VAR)?;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::Invalid {
                key: GATEWAY_URL_VAR,
                reason: "expected an http(s) URL".into(),
            });
        }
        let api_key = required(&lookup, GATEWAY_KEY_VAR)?;
        tracing::debug!(url = %url, "gateway configuration loaded");
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::Missing(key))
}
