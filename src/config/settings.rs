//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings. Every
//! section is optional; an empty file yields a session on the public spot
//! stream with default timing and no subscriptions.
//!
//! # Example
//!
//! ```no_run
//! use bybit_stream::config::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use super::logging::LoggingConfig;
use super::stream::{ReconnectionConfig, StreamConfig};
use crate::error::{ConfigError, Result};
use crate::stream::endpoint::Endpoint;
use crate::stream::messages::Subscription;
use crate::stream::session::SessionSettings;
use crate::stream::subscription::SubscriptionRegistry;

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Endpoint selection and per-connection timing.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Retry ceiling and backoff.
    #[serde(default)]
    pub reconnection: ReconnectionConfig,

    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Requests replayed, in order, on every connection.
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        if self.stream.host.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "host" }.into());
        }
        if self.stream.api_version.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "api_version",
            }
            .into());
        }
        if self.stream.ping_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ping_interval_secs",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.stream.ping_req_id.is_empty() {
            return Err(ConfigError::MissingField {
                field: "ping_req_id",
            }
            .into());
        }
        if self.reconnection.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.reconnection.backoff_unit_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "backoff_unit_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.reconnection.throttled_backoff_unit_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "throttled_backoff_unit_ms",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if let Some(empty) = self.subscriptions.iter().find(|s| s.args.is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "subscriptions",
                reason: format!("'{}' request has no topics", empty.op),
            }
            .into());
        }
        Ok(())
    }

    /// The websocket endpoint selected by `[stream]`.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        self.stream.endpoint()
    }

    /// Session tunables from `[stream]` and `[reconnection]`.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            ping_interval: self.stream.ping_interval(),
            ping_req_id: self.stream.ping_req_id.clone(),
            shutdown_timeout: self.stream.shutdown_timeout(),
            reconnect: self.reconnection.policy(),
        }
    }

    /// The configured subscriptions, ready for replay.
    ///
    /// # Errors
    ///
    /// Returns an error if a subscription cannot be serialized.
    pub fn subscription_registry(&self) -> Result<SubscriptionRegistry> {
        SubscriptionRegistry::from_subscriptions(self.subscriptions.iter().cloned())
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
