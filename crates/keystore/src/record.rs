//! Key record data model

use serde::{Deserialize, Serialize};

/// One pooled API credential with its health bookkeeping.
///
/// Timestamps are unix milliseconds. `last_used` stays `None` until the key
/// serves its first successful call; selection treats never-used keys as the
/// most starved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyRecord {
    /// Opaque unique identifier assigned at creation
    pub id: String,
    /// The credential value sent to the upstream service
    pub secret: String,
    /// Inactive keys are never selected; reversible via reactivation
    pub is_active: bool,
    /// Unix millis of the last successful use
    pub last_used: Option<u64>,
    /// Consecutive non-rate-limit failures since the last reset
    pub failure_count: u32,
    /// Cooldown expiry in unix millis; a future value means in cooldown
    pub rate_limit_reset_at: Option<u64>,
}

impl KeyRecord {
    /// A record in the default state for a freshly registered secret.
    pub fn new(id: String, secret: String) -> Self {
        Self {
            id,
            secret,
            is_active: true,
            last_used: None,
            failure_count: 0,
            rate_limit_reset_at: None,
        }
    }

    /// Whether the key sits inside an unexpired rate-limit cooldown.
    ///
    /// A reset time equal to `now_millis` counts as expired: the key is
    /// eligible the instant the window closes.
    pub fn in_cooldown(&self, now_millis: u64) -> bool {
        matches!(self.rate_limit_reset_at, Some(reset) if reset > now_millis)
    }

    /// Whether the key may be handed out at `now_millis`.
    pub fn is_eligible(&self, now_millis: u64) -> bool {
        self.is_active && !self.in_cooldown(now_millis)
    }

    /// Re-enable the key: active, zero failures, no cooldown.
    pub fn reactivate(&mut self) {
        self.is_active = true;
        self.failure_count = 0;
        self.rate_limit_reset_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> KeyRecord {
        KeyRecord::new("key_1".into(), "sk-1".into())
    }

    #[test]
    fn new_record_has_default_state() {
        let r = record();
        assert!(r.is_active);
        assert_eq!(r.failure_count, 0);
        assert!(r.last_used.is_none());
        assert!(r.rate_limit_reset_at.is_none());
    }

    #[test]
    fn cooldown_boundary_is_exclusive() {
        let mut r = record();
        r.rate_limit_reset_at = Some(1_000);
        assert!(r.in_cooldown(999));
        assert!(!r.in_cooldown(1_000), "reset time reached means expired");
        assert!(!r.in_cooldown(1_001));
    }

    #[test]
    fn inactive_key_is_never_eligible() {
        let mut r = record();
        r.is_active = false;
        assert!(!r.is_eligible(0), "inactive wins over clear cooldown state");
    }

    #[test]
    fn expired_cooldown_restores_eligibility() {
        let mut r = record();
        r.failure_count = 3;
        r.rate_limit_reset_at = Some(500);
        assert!(!r.is_eligible(100));
        assert!(r.is_eligible(500));
        // Cooldown expiry does not touch the failure counter
        assert_eq!(r.failure_count, 3);
    }

    #[test]
    fn reactivate_resets_health_state() {
        let mut r = record();
        r.is_active = false;
        r.failure_count = 5;
        r.rate_limit_reset_at = Some(9_999);
        r.last_used = Some(42);

        r.reactivate();

        assert!(r.is_active);
        assert_eq!(r.failure_count, 0);
        assert!(r.rate_limit_reset_at.is_none());
        assert_eq!(r.last_used, Some(42), "reactivation keeps usage history");
    }
}
