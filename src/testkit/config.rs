//! Canonical test configurations.
//!
//! Single source of truth for session settings used across tests. Timing
//! matches the production defaults so paused-clock tests can assert exact
//! delays.

use std::time::Duration;

use crate::stream::retry::{ReconnectPolicy, RetryMode};
use crate::stream::session::SessionSettings;

/// Production timing: 20s heartbeat, 1s shutdown wait, 10 attempts.
pub fn settings() -> SessionSettings {
    SessionSettings::default()
}

/// Production timing with a custom attempt ceiling.
pub fn settings_with_max_attempts(max_attempts: u32) -> SessionSettings {
    SessionSettings {
        reconnect: ReconnectPolicy {
            max_attempts,
            ..ReconnectPolicy::default()
        },
        ..SessionSettings::default()
    }
}

/// Settings that reset the attempt counter once a connection delivers data.
pub fn reset_on_success() -> SessionSettings {
    SessionSettings {
        reconnect: ReconnectPolicy {
            mode: RetryMode::ResetOnSuccess,
            ..ReconnectPolicy::default()
        },
        ..SessionSettings::default()
    }
}

/// Settings with a heartbeat period short enough to observe in a test.
pub fn fast_heartbeat(period: Duration) -> SessionSettings {
    SessionSettings {
        ping_interval: period,
        ..SessionSettings::default()
    }
}
