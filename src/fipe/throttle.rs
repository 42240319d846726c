//! Adaptive request pacing
//!
//! `ThrottleController` holds the minimum interval enforced between
//! consecutive requests. The interval doubles on every rate-limited response
//! and shrinks by a quarter after a run of consecutive successes, always
//! staying within `[base, max]`. All transitions take the current `Instant`
//! as an argument so the controller can be driven without real timers.

use crate::config::ClientConfig;
use std::time::{Duration, Instant};

/// Consecutive successes required before the interval is relaxed
pub const SUCCESS_STREAK_TO_RELAX: u32 = 10;

/// Tracks the adaptive inter-request interval
#[derive(Debug, Clone)]
pub struct ThrottleController {
    /// Floor of the interval
    base_interval: Duration,

    /// Cap of the interval
    max_interval: Duration,

    /// Interval currently enforced between requests
    current_interval: Duration,

    /// When the previous request completed
    last_request_time: Option<Instant>,

    /// Successes since the last rate limit or relaxation
    consecutive_successes: u32,
}

impl ThrottleController {
    /// Creates a controller starting at the floor
    pub fn new(base_interval: Duration, max_interval: Duration) -> Self {
        let max_interval = max_interval.max(base_interval);
        Self {
            base_interval,
            max_interval,
            current_interval: base_interval,
            last_request_time: None,
            consecutive_successes: 0,
        }
    }

    /// Creates a controller from the client configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_interval_ms),
            Duration::from_millis(config.max_interval_ms),
        )
    }

    /// Returns how long to wait before the next request may be sent
    ///
    /// Returns `Duration::ZERO` if a request can be made now.
    pub fn wait_time(&self, now: Instant) -> Duration {
        match self.last_request_time {
            Some(last) => self
                .current_interval
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Records that a request finished at `now`
    pub fn record_completion(&mut self, now: Instant) {
        self.last_request_time = Some(now);
    }

    /// Doubles the interval (capped) and resets the success streak
    pub fn on_rate_limited(&mut self) {
        self.current_interval = (self.current_interval * 2).min(self.max_interval);
        self.consecutive_successes = 0;
    }

    /// Counts a success; relaxes the interval by 25% once the streak reaches
    /// [`SUCCESS_STREAK_TO_RELAX`] while above the floor
    ///
    /// Returns true if the interval was relaxed.
    pub fn on_success(&mut self) -> bool {
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);

        if self.consecutive_successes >= SUCCESS_STREAK_TO_RELAX
            && self.current_interval > self.base_interval
        {
            self.current_interval = (self.current_interval * 3 / 4).max(self.base_interval);
            self.consecutive_successes = 0;
            return true;
        }

        false
    }

    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }
}

/// Exponential backoff: `base * 2^attempt`
pub fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Parses a `Retry-After` header given in whole seconds
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
