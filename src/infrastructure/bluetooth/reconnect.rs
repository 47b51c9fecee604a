//! Reconnection Policy
//!
//! Exponential backoff for dice that dropped without being asked to.

use crate::domain::settings::ConnectionSettings;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_settings(&ConnectionSettings::default())
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

impl ReconnectPolicy {
    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        Self {
            base_delay: Duration::from_millis(settings.reconnect_base_delay_ms),
            max_delay: Duration::from_millis(settings.reconnect_max_delay_ms),
            max_attempts: settings.reconnect_max_attempts,
        }
    }

    /// Wait before the first attempt
    pub fn initial_delay(&self) -> Duration {
        self.base_delay
    }

    /// `failed_attempts` counts the failures so far, including the one just seen
    pub fn after_failure(&self, failed_attempts: u32) -> RetryDecision {
        if failed_attempts >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.backoff(failed_attempts))
    }

    /// `base * 2^(failed_attempts - 1)`, capped at `max_delay`
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}
