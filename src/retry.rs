//! Exponential backoff for reconnect loops.
//!
//! A [`RetryTimer`] hands out the delay to sleep before the next attempt. The
//! delay starts at a base, doubles after every call and plateaus at a cap so
//! that a long outage never pushes the next attempt arbitrarily far out.

use std::time::Duration;

/// Default first delay handed out by [`RetryTimer::default`].
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(200);

/// Default upper bound for [`RetryTimer::default`].
pub const DEFAULT_RETRY_CAP: Duration = Duration::from_secs(30);

/// Geometric backoff state for a single connection-attempt loop.
///
/// Timers are never reset; start a new loop with a new timer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryTimer {
    cap: Duration,
    next: Duration,
}

impl RetryTimer {
    /// Creates a timer whose first delay is `base`, clamped to `cap`.
    #[must_use]
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            cap,
            next: base.min(cap),
        }
    }

    /// Returns the delay before the next attempt and advances the timer.
    pub fn next_time(&mut self) -> Duration {
        let current = self.next;
        self.next = current.saturating_mul(2).min(self.cap);
        current
    }

    /// Returns the delay the next call to [`RetryTimer::next_time`] yields.
    #[must_use]
    pub const fn peek(&self) -> Duration {
        self.next
    }

    /// Returns the configured cap.
    #[must_use]
    pub const fn cap(&self) -> Duration {
        self.cap
    }
}

impl Default for RetryTimer {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_BASE, DEFAULT_RETRY_CAP)
    }
}
