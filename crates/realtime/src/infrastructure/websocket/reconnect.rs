//! Reconnect policy: capped exponential backoff with a bounded attempt count.
//!
//! Free of any runtime dependency; the connection core asks it for the next
//! delay and schedules the timer itself.

use std::time::Duration;

use crate::config::ReconnectConfig;

/// Backoff state for automatic reconnects.
///
/// Attempt `n` (1-based) waits `min(base * 2^n, max)`. Once `max_attempts`
/// retries have been scheduled, no further delay is handed out until the
/// policy is reset.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Called on a successful open and on an explicit connect.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }

    /// Delay for attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = self
            .config
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.config.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Advance to the next attempt.
    ///
    /// Returns the delay to wait before performing it, or `None` when the
    /// attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        Some(self.delay_for(self.attempts))
    }
}
