//! Reconnection backoff and attempt accounting.

use std::time::Duration;

use serde::Deserialize;

use super::classifier::WaitHint;

/// Default attempt ceiling.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default backoff unit for ordinary retriable failures.
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_millis(500);

/// Default backoff unit for "try again later" closures.
pub const DEFAULT_EXTENDED_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// When the attempt counter goes back to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// Never reset within one session; the ceiling covers the whole run.
    #[default]
    Cumulative,
    /// Reset once a reconnected stream delivers its first frame.
    ResetOnSuccess,
}

/// Linear backoff: `attempt × unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub unit: Duration,
    pub extended_unit: Duration,
}

impl Backoff {
    #[must_use]
    pub const fn new(unit: Duration, extended_unit: Duration) -> Self {
        Self {
            unit,
            extended_unit,
        }
    }

    /// Delay before reconnection attempt `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32, hint: WaitHint) -> Duration {
        let unit = match hint {
            WaitHint::Standard => self.unit,
            WaitHint::Extended => self.extended_unit,
        };
        unit.saturating_mul(attempt)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_UNIT, DEFAULT_EXTENDED_BACKOFF_UNIT)
    }
}

/// Everything the session needs to decide on a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub mode: RetryMode,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
            mode: RetryMode::default(),
        }
    }
}

/// What to do after a retriable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Reconnect { attempt: u32, delay: Duration },
    GiveUp { attempts: u32 },
}

/// Session-scoped attempt counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
}

impl RetryState {
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Count one failed connection cycle and decide whether to reconnect.
    #[must_use]
    pub fn record_failure(self, hint: WaitHint, policy: &ReconnectPolicy) -> (Self, RetryDecision) {
        let attempts = self.attempts.saturating_add(1);
        let decision = if attempts >= policy.max_attempts {
            RetryDecision::GiveUp { attempts }
        } else {
            RetryDecision::Reconnect {
                attempt: attempts,
                delay: policy.backoff.delay(attempts, hint),
            }
        };
        (Self { attempts }, decision)
    }

    /// Apply the policy's reset rule after a connection proved healthy.
    #[must_use]
    pub const fn record_success(self, policy: &ReconnectPolicy) -> Self {
        match policy.mode {
            RetryMode::Cumulative => self,
            RetryMode::ResetOnSuccess => Self { attempts: 0 },
        }
    }
}
