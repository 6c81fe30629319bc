//! # Exponential Backoff
//!
//! Per-resource retry delay used by the error policy. The delay doubles after
//! each consecutive failure and is capped, then starts over once a reconcile
//! succeeds.
//!
//! ## Usage
//!
//! ```rust
//! use kibana_operator::controller::backoff::ExponentialBackoff;
//!
//! let mut backoff = ExponentialBackoff::new(5, 300);
//! assert_eq!(backoff.next_backoff_seconds(), 5);
//! assert_eq!(backoff.next_backoff_seconds(), 10);
//! assert_eq!(backoff.next_backoff_seconds(), 20);
//! ```

use std::time::Duration;

/// Exponential backoff calculator, in seconds
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min_seconds: u64,
    current_seconds: u64,
    max_seconds: u64,
}

impl ExponentialBackoff {
    /// Sequence starts at `min_seconds` and never exceeds `max_seconds`
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        let min_seconds = min_seconds.max(1);
        Self {
            min_seconds,
            current_seconds: min_seconds,
            max_seconds: max_seconds.max(min_seconds),
        }
    }

    /// Current delay, then advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_seconds;
        self.current_seconds = self.current_seconds.saturating_mul(2).min(self.max_seconds);
        result
    }

    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    pub fn reset(&mut self) {
        self.current_seconds = self.min_seconds;
    }
}
