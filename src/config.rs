//! Configuration management for HookRelay
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all dispatch settings. It uses the `figment`
//! crate to load configuration from a `hookrelay.toml` file and merge it
//! with environment variables.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// The main configuration struct for the crate.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the hosting process.
    pub log_level: String,
    /// Settings for the delivery-with-retry protocol.
    pub dispatch: DispatchConfig,
    /// Settings for the outbound HTTP transport.
    pub http: HttpConfig,
}

/// Settings for the delivery-with-retry protocol.
///
/// `attempts` is deserialized through `u32`, so negative values are
/// rejected at the configuration layer before they reach the engine.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Maximum delivery attempts per target per notification.
    /// Zero means no attempts are made at all.
    pub attempts: u32,
    /// Initial backoff between failed attempts in milliseconds, doubled
    /// after each failure. `None` retries immediately.
    pub retry_backoff_ms: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            attempts: 1,
            retry_backoff_ms: None,
        }
    }
}

/// Settings for the outbound HTTP transport.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Per-attempt request timeout in milliseconds, enforced by the client.
    pub request_timeout_ms: u64,
    /// Content type sent with each webhook request. Payload bytes are
    /// forwarded unmodified regardless of this value.
    pub content_type: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            content_type: "application/json".to_string(),
        }
    }
}

impl Config {
    /// Loads the configuration from the specified file.
    ///
    /// # Arguments
    /// * `config_path` - The path to the TOML configuration file.
    pub fn load(config_path: &str) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // Allow overriding with environment variables, e.g., HOOKRELAY_LOG_LEVEL=debug
            .merge(Env::prefixed("HOOKRELAY_"))
            .extract()?;
        Ok(config)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            dispatch: DispatchConfig::default(),
            http: HttpConfig::default(),
        }
    }
}
