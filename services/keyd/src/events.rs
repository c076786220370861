//! Event sink wiring for the service
//!
//! Wraps the tracing sink so every key lifecycle event is also counted in
//! Prometheus under `key_events_total`.

use key_authority::{EventSink, TracingSink};
use serde_json::Value;

/// Sink combining structured logs with event counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObservedSink {
    inner: TracingSink,
}

impl ObservedSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for ObservedSink {
    fn record(&self, event: &str, attributes: Value) {
        crate::metrics::record_key_event(event);
        self.inner.record(event, attributes);
    }

    fn record_error(&self, error: &dyn std::error::Error, context: Value) {
        self.inner.record_error(error, context);
    }
}
