//! Clock abstraction for cooldown and selection logic
//!
//! Every time comparison in the authority goes through an injected `Clock`,
//! so tests drive cooldown expiry by advancing a counter instead of sleeping.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" for selection and cooldown comparisons.
pub trait Clock: Send + Sync {
    /// Current unix timestamp in milliseconds.
    fn now_millis(&self) -> u64;
}

/// Wall-clock implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
