//! Rate-limit classification for upstream failures
//!
//! A failure counts as rate-limited when the status is 429 or the error
//! message mentions "rate limit". A status-based trigger may carry an
//! `x-ratelimit-reset` header (unix epoch seconds) fixing the exact cooldown
//! expiry; everything else falls back to a fixed cooldown from now.

use std::collections::HashMap;
use std::time::Duration;

/// Details reported after a failed upstream call.
#[derive(Debug, Clone, Default)]
pub struct FailureInfo {
    /// HTTP-like status code, when the failure carried one
    pub status: Option<u16>,
    /// Upstream error message, when available
    pub message: Option<String>,
    /// Response headers, as received
    pub headers: HashMap<String, String>,
}

/// Which rate-limit triggers matched for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status_rate_limit: bool,
    pub message_rate_limit: bool,
}

impl Classification {
    /// Whether either trigger matched.
    pub fn is_rate_limited(&self) -> bool {
        self.status_rate_limit || self.message_rate_limit
    }

    /// Trigger label for the "Rate Limit Detected" event. Status wins when
    /// both triggers match.
    pub fn trigger(&self) -> &'static str {
        if self.status_rate_limit {
            "status_429"
        } else {
            "message_match"
        }
    }
}

/// Message substring that marks a failure as rate-limit related.
const RATE_LIMIT_PATTERN: &str = "rate limit";

/// Header carrying the upstream's cooldown expiry in unix epoch seconds.
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Classify a failure by status code and message.
pub fn classify(failure: &FailureInfo) -> Classification {
    let status_rate_limit = failure.status == Some(429);
    let message_rate_limit = failure
        .message
        .as_deref()
        .is_some_and(|m| m.to_lowercase().contains(RATE_LIMIT_PATTERN));
    Classification {
        status_rate_limit,
        message_rate_limit,
    }
}

/// Cooldown expiry in unix millis for a rate-limited failure.
///
/// A status-based trigger with a parseable `x-ratelimit-reset` header uses
/// the header's epoch-seconds value; message-based triggers and missing,
/// malformed, or overflowing headers fall back to `now + cooldown`.
pub fn cooldown_expiry(
    classification: Classification,
    failure: &FailureInfo,
    now_millis: u64,
    cooldown: Duration,
) -> u64 {
    if classification.status_rate_limit {
        let reset_millis =
            reset_header_secs(&failure.headers).and_then(|secs| secs.checked_mul(1000));
        if let Some(reset_millis) = reset_millis {
            return reset_millis;
        }
    }
    now_millis + cooldown.as_millis() as u64
}

fn reset_header_secs(headers: &HashMap<String, String>) -> Option<u64> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(RESET_HEADER))
        .and_then(|(_, value)| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(status: Option<u16>, message: Option<&str>) -> FailureInfo {
        FailureInfo {
            status,
            message: message.map(str::to_string),
            headers: HashMap::new(),
        }
    }

    const COOLDOWN: Duration = Duration::from_secs(60);

    #[test]
    fn status_429_is_rate_limited() {
        let c = classify(&failure(Some(429), Some("too many requests")));
        assert!(c.status_rate_limit);
        assert!(!c.message_rate_limit);
        assert!(c.is_rate_limited());
        assert_eq!(c.trigger(), "status_429");
    }

    #[test]
    fn message_match_is_rate_limited_without_429() {
        let c = classify(&failure(Some(400), Some("Rate limit exceeded")));
        assert!(!c.status_rate_limit);
        assert!(c.message_rate_limit);
        assert_eq!(c.trigger(), "message_match");
    }

    #[test]
    fn message_match_is_case_insensitive() {
        let c = classify(&failure(None, Some("RATE LIMIT hit, slow down")));
        assert!(c.message_rate_limit);
    }

    #[test]
    fn ordinary_failure_is_not_rate_limited() {
        let c = classify(&failure(Some(500), Some("internal server error")));
        assert!(!c.is_rate_limited());
    }

    #[test]
    fn missing_status_and_message_is_not_rate_limited() {
        let c = classify(&failure(None, None));
        assert!(!c.is_rate_limited());
    }

    #[test]
    fn status_trigger_uses_reset_header() {
        let mut f = failure(Some(429), None);
        f.headers
            .insert("x-ratelimit-reset".into(), "1700000000".into());
        let c = classify(&f);
        assert_eq!(cooldown_expiry(c, &f, 0, COOLDOWN), 1_700_000_000_000);
    }

    #[test]
    fn reset_header_name_is_case_insensitive() {
        let mut f = failure(Some(429), None);
        f.headers
            .insert("X-RateLimit-Reset".into(), "1700000000".into());
        let c = classify(&f);
        assert_eq!(cooldown_expiry(c, &f, 0, COOLDOWN), 1_700_000_000_000);
    }

    #[test]
    fn missing_header_falls_back_to_default_cooldown() {
        let f = failure(Some(429), None);
        let c = classify(&f);
        assert_eq!(cooldown_expiry(c, &f, 10_000, COOLDOWN), 70_000);
    }

    #[test]
    fn malformed_header_falls_back_to_default_cooldown() {
        let mut f = failure(Some(429), None);
        f.headers
            .insert("x-ratelimit-reset".into(), "soon".into());
        let c = classify(&f);
        assert_eq!(cooldown_expiry(c, &f, 10_000, COOLDOWN), 70_000);
    }

    #[test]
    fn overflowing_header_falls_back_to_default_cooldown() {
        // Seconds-to-millis conversion would overflow u64
        let mut f = failure(Some(429), None);
        f.headers
            .insert("x-ratelimit-reset".into(), u64::MAX.to_string());
        let c = classify(&f);
        assert_eq!(cooldown_expiry(c, &f, 10_000, COOLDOWN), 70_000);
    }

    #[test]
    fn message_trigger_ignores_reset_header() {
        let mut f = failure(None, Some("rate limit exceeded"));
        f.headers
            .insert("x-ratelimit-reset".into(), "1700000000".into());
        let c = classify(&f);
        assert_eq!(cooldown_expiry(c, &f, 10_000, COOLDOWN), 70_000);
    }
}
