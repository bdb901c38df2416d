//! Stream endpoint, heartbeat and reconnection configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::stream::endpoint::{
    ChannelType, CoverType, Endpoint, DEFAULT_API_VERSION, DEFAULT_HOST,
};
use crate::stream::messages::DEFAULT_PING_REQ_ID;
use crate::stream::retry::{Backoff, ReconnectPolicy, RetryMode};

/// Endpoint and per-connection timing.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub channel: ChannelType,
    #[serde(default)]
    pub cover: CoverType,
    /// Seconds between heartbeat frames.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// `reqId` carried by every heartbeat frame.
    #[serde(default = "default_ping_req_id")]
    pub ping_req_id: String,
    /// How long to wait for the peer to answer our close frame (milliseconds).
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.into()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.into()
}

fn default_ping_interval_secs() -> u64 {
    20
}

fn default_ping_req_id() -> String {
    DEFAULT_PING_REQ_ID.into()
}

fn default_shutdown_timeout_ms() -> u64 {
    1000
}

impl StreamConfig {
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.api_version.clone())
            .with_channel(self.channel)
            .with_cover(self.cover)
    }

    #[must_use]
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_version: default_api_version(),
            channel: ChannelType::default(),
            cover: CoverType::default(),
            ping_interval_secs: default_ping_interval_secs(),
            ping_req_id: default_ping_req_id(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

/// Reconnection ceiling and linear backoff units.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectionConfig {
    /// Failed connection cycles tolerated before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff unit for ordinary failures (milliseconds).
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
    /// Backoff unit after a "try again later" closure (milliseconds).
    #[serde(default = "default_throttled_backoff_unit_ms")]
    pub throttled_backoff_unit_ms: u64,
    #[serde(default)]
    pub mode: RetryMode,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_backoff_unit_ms() -> u64 {
    500
}

fn default_throttled_backoff_unit_ms() -> u64 {
    1000
}

impl ReconnectionConfig {
    #[must_use]
    pub const fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_attempts,
            backoff: Backoff::new(
                Duration::from_millis(self.backoff_unit_ms),
                Duration::from_millis(self.throttled_backoff_unit_ms),
            ),
            mode: self.mode,
        }
    }
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_unit_ms: default_backoff_unit_ms(),
            throttled_backoff_unit_ms: default_throttled_backoff_unit_ms(),
            mode: RetryMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::classifier::WaitHint;

    #[test]
    fn default_policy_matches_library_defaults() {
        assert_eq!(
            ReconnectionConfig::default().policy(),
            ReconnectPolicy::default()
        );
    }

    #[test]
    fn policy_uses_configured_units() {
        let config = ReconnectionConfig {
            backoff_unit_ms: 100,
            throttled_backoff_unit_ms: 250,
            ..ReconnectionConfig::default()
        };
        let policy = config.policy();
        assert_eq!(
            policy.backoff.delay(3, WaitHint::Standard),
            Duration::from_millis(300)
        );
        assert_eq!(
            policy.backoff.delay(3, WaitHint::Extended),
            Duration::from_millis(750)
        );
    }

    #[test]
    fn default_endpoint_is_public_spot() {
        assert_eq!(StreamConfig::default().endpoint().path(), "/v5/public/spot");
    }
}
