//! Key selection and health state machine
//!
//! The authority holds at most one current key. `get_key` hands out the
//! current secret while it stays usable and rotates to the most starved
//! eligible key otherwise. Outcome reports drive per-key state: a rate limit
//! puts the key into cooldown and forces rotation, repeated ordinary failures
//! deactivate it.
//!
//! Per-key transitions:
//! - Ready → Cooldown (rate-limited failure)
//! - Cooldown → Ready (reset time reached, checked lazily on access)
//! - Ready → Inactive (failure count reaches the threshold)
//! - Inactive → Ready (explicit reactivation via `register_key` only)

use std::sync::Arc;
use std::time::Duration;

use keystore::{KeyRecord, KeyStore};
use serde_json::json;
use tokio::sync::Mutex;

use crate::classify::{self, FailureInfo};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::events::EventSink;

/// Tunables for the health state machine.
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Cooldown applied when a rate limit carries no reset header.
    pub cooldown: Duration,
    /// Consecutive ordinary failures that deactivate a key.
    pub max_failures: u32,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(60),
            max_failures: 5,
        }
    }
}

/// Single in-process owner of the "current" key.
///
/// All mutating operations run under the internal Mutex, so one authority
/// instance can be shared across concurrent callers without lost updates to
/// the current key or the underlying record. Independent pools (e.g. per
/// tenant) are independent instances; there is no global state.
pub struct KeyAuthority {
    current: Mutex<Option<KeyRecord>>,
    store: Arc<dyn KeyStore>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    config: AuthorityConfig,
}

impl KeyAuthority {
    /// Create an authority over the given store and event sink.
    pub fn new(
        store: Arc<dyn KeyStore>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        config: AuthorityConfig,
    ) -> Self {
        Self {
            current: Mutex::new(None),
            store,
            events,
            clock,
            config,
        }
    }

    /// Ensure a current key is held, selecting one if none is.
    ///
    /// Idempotent: a second call while a key is held selects nothing.
    pub async fn initialize(&self) -> Result<()> {
        let mut current = self.current.lock().await;
        if current.is_none() {
            *current = Some(self.select().await?);
        }
        Ok(())
    }

    /// Secret of the current key, rotating first when none is held or the
    /// held key sits inside an unexpired cooldown.
    ///
    /// This is the one entry point callers use before an outbound call.
    pub async fn get_key(&self) -> Result<String> {
        let mut current = self.current.lock().await;
        if let Some(key) = current.as_ref() {
            if !key.in_cooldown(self.clock.now_millis()) {
                return Ok(key.secret.clone());
            }
        }

        let key = self.select().await?;
        let secret = key.secret.clone();
        *current = Some(key);
        Ok(secret)
    }

    /// Record a successful use of the current key. No-op when none is held.
    ///
    /// Persistence failures are logged and swallowed: losing one bookkeeping
    /// update must not break the caller's happy path.
    pub async fn report_success(&self) {
        let mut current = self.current.lock().await;
        let Some(key) = current.as_mut() else {
            return;
        };

        key.last_used = Some(self.clock.now_millis());
        if let Err(e) = self.store.save(key).await {
            self.events.record_error(
                &e,
                json!({ "action": "report_success", "key_id": &key.id }),
            );
            return;
        }
        self.events.record(
            "Key Success",
            json!({ "key_id": &key.id, "last_used": key.last_used }),
        );
    }

    /// Record a failed use of the current key and apply the resulting state
    /// transition. Returns whether the failure was classified rate-limited.
    ///
    /// No-op (false) when no key is held. Persistence errors are logged with
    /// the key id and absorbed; this method never propagates an error.
    pub async fn report_failure(&self, failure: FailureInfo) -> bool {
        let mut current = self.current.lock().await;
        let Some(key) = current.as_mut() else {
            return false;
        };

        let classification = classify::classify(&failure);
        self.events.record(
            "Error Analysis",
            json!({
                "key_id": &key.id,
                "status_code": failure.status,
                "error_message": &failure.message,
                "status_rate_limit": classification.status_rate_limit,
                "message_rate_limit": classification.message_rate_limit,
                "headers": &failure.headers,
            }),
        );

        if classification.is_rate_limited() {
            let now = self.clock.now_millis();
            let reset_at =
                classify::cooldown_expiry(classification, &failure, now, self.config.cooldown);
            key.rate_limit_reset_at = Some(reset_at);

            self.events.record(
                "Rate Limit Detected",
                json!({
                    "key_id": &key.id,
                    "reset_at": reset_at,
                    "status_code": failure.status,
                    "message": &failure.message,
                    "trigger": classification.trigger(),
                }),
            );

            if let Err(e) = self.store.save(key).await {
                self.events.record_error(
                    &e,
                    json!({ "action": "report_failure", "key_id": &key.id }),
                );
                return false;
            }

            // Force the next get_key to rotate
            *current = None;
            return true;
        }

        key.failure_count += 1;
        let deactivated = key.failure_count >= self.config.max_failures;
        if deactivated {
            key.is_active = false;
            self.events.record(
                "Key Deactivated",
                json!({
                    "key_id": &key.id,
                    "reason": "too many failures",
                    "failure_count": key.failure_count,
                    "last_error": &failure.message,
                }),
            );
        }

        if let Err(e) = self.store.save(key).await {
            self.events.record_error(
                &e,
                json!({ "action": "report_failure", "key_id": &key.id }),
            );
            return false;
        }

        if deactivated {
            *current = None;
        }
        false
    }

    /// Register a secret with the pool.
    ///
    /// A known secret is reactivated (active, zero failures, no cooldown); an
    /// unknown one becomes a fresh record. Store errors are logged and
    /// re-raised — the caller needs to know registration didn't stick.
    pub async fn register_key(&self, secret: &str) -> Result<KeyRecord> {
        let existing = match self.store.find_by_secret(secret).await {
            Ok(existing) => existing,
            Err(e) => {
                self.events
                    .record_error(&e, json!({ "action": "register_key" }));
                return Err(e.into());
            }
        };

        if let Some(mut key) = existing {
            key.reactivate();
            if let Err(e) = self.store.save(&key).await {
                self.events.record_error(
                    &e,
                    json!({ "action": "register_key", "key_id": &key.id }),
                );
                return Err(e.into());
            }
            self.events
                .record("Key Reactivated", json!({ "key_id": &key.id }));
            return Ok(key);
        }

        let key = match self.store.create(secret).await {
            Ok(key) => key,
            Err(e) => {
                self.events
                    .record_error(&e, json!({ "action": "register_key" }));
                return Err(e.into());
            }
        };
        self.events
            .record("New Key Added", json!({ "key_id": &key.id }));
        Ok(key)
    }

    /// Id of the currently held key, if any.
    pub async fn current_key_id(&self) -> Option<String> {
        self.current.lock().await.as_ref().map(|k| k.id.clone())
    }

    /// Pool health summary for the health endpoint. Never exposes secrets.
    ///
    /// Status mapping: all keys ready → healthy, some ready → degraded,
    /// none ready → unhealthy.
    pub async fn health(&self) -> Result<serde_json::Value> {
        let records = self.store.find_all().await?;
        let now = self.clock.now_millis();

        let mut keys = Vec::new();
        let mut ready = 0usize;
        let mut cooling = 0usize;
        let mut inactive = 0usize;

        for record in &records {
            if !record.is_active {
                inactive += 1;
                keys.push(json!({
                    "id": &record.id,
                    "status": "inactive",
                    "failure_count": record.failure_count,
                }));
            } else if record.in_cooldown(now) {
                cooling += 1;
                let remaining = record.rate_limit_reset_at.unwrap_or(now) - now;
                keys.push(json!({
                    "id": &record.id,
                    "status": "cooling_down",
                    "failure_count": record.failure_count,
                    "cooldown_remaining_ms": remaining,
                }));
            } else {
                ready += 1;
                keys.push(json!({
                    "id": &record.id,
                    "status": "ready",
                    "failure_count": record.failure_count,
                }));
            }
        }

        let total = records.len();
        let status = if ready == total && total > 0 {
            "healthy"
        } else if ready > 0 {
            "degraded"
        } else {
            "unhealthy"
        };

        Ok(json!({
            "status": status,
            "keys_total": total,
            "keys_ready": ready,
            "keys_cooling_down": cooling,
            "keys_inactive": inactive,
            "current_key": self.current_key_id().await,
            "keys": keys,
        }))
    }

    /// Query eligible keys and pick the most starved one.
    ///
    /// Never-used keys sort before any timestamp; ties on equal `last_used`
    /// break by id so the pick doesn't depend on store iteration order.
    async fn select(&self) -> Result<KeyRecord> {
        let now = self.clock.now_millis();
        let candidates = match self.store.find_eligible(now).await {
            Ok(candidates) => candidates,
            Err(e) => {
                self.events.record_error(&e, json!({ "action": "select" }));
                return Err(e.into());
            }
        };

        let key = candidates
            .into_iter()
            .min_by(|a, b| a.last_used.cmp(&b.last_used).then_with(|| a.id.cmp(&b.id)));

        let Some(key) = key else {
            let err = Error::NoAvailableKey;
            self.events.record_error(&err, json!({ "action": "select" }));
            return Err(err);
        };

        self.events.record(
            "Key Rotation",
            json!({
                "key_id": &key.id,
                "last_used": key.last_used,
                "failure_count": key.failure_count,
            }),
        );
        Ok(key)
    }
}
