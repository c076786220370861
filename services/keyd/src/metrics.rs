//! Prometheus metrics exposition
//!
//! - `key_events_total` (counter): label `event`, one increment per key
//!   lifecycle event emitted by the authority
//! - `key_lease_errors_total` (counter): lease requests that found no
//!   usable key

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return a handle for rendering.
///
/// The handle's `render()` produces the Prometheus text exposition format
/// served on `/metrics`.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Count one key lifecycle event by name.
pub fn record_key_event(event: &str) {
    metrics::counter!("key_events_total", "event" => event.to_string()).increment(1);
}

/// Count a lease request that failed to produce a key.
pub fn record_lease_error() {
    metrics::counter!("key_lease_errors_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        // When no recorder is installed, metrics calls are no-ops. This
        // verifies the functions don't panic in test environments.
        record_key_event("Key Rotation");
        record_lease_error();
    }
}
