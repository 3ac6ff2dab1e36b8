//! Rate limiting for the Myers medium path.
//!
//! Myers is cheap when captures are similar and wasted work when they are
//! not. Spacing is measured from the last successful run: at least `base`,
//! doubled for every consecutive run that blew the edit bound (capped at
//! 16x). Repeated scroll-detection misses may force an attempt inside the
//! base window, but never inside a failure backoff window.

use std::time::{Duration, Instant};

/// Exponent cap: backoff tops out at `base * 2^4`.
const MAX_BACKOFF_SHIFT: u32 = 4;

/// Scroll misses in a row after which the base window is ignored.
pub const FORCE_AFTER_KMP_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackoffState {
    /// Last run that produced an edit script. Overflows leave it untouched.
    pub last_success: Option<Instant>,
    pub consecutive_failures: u32,
}

impl BackoffState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spacing required after the current failure streak.
    pub fn backoff(&self, base: Duration) -> Duration {
        base * (1u32 << self.consecutive_failures.min(MAX_BACKOFF_SHIFT))
    }

    /// Whether a Myers attempt is allowed at `now`.
    pub fn allow(&self, now: Instant, base: Duration, kmp_failures: u32) -> bool {
        // Never succeeded: the window is open.
        let Some(last) = self.last_success else {
            return true;
        };
        let elapsed = now.saturating_duration_since(last);
        if self.consecutive_failures > 0 {
            return elapsed >= self.backoff(base);
        }
        elapsed >= base || kmp_failures >= FORCE_AFTER_KMP_FAILURES
    }

    pub fn record_success(&mut self, now: Instant) {
        self.last_success = Some(now);
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}
