//! Event sink for key lifecycle observability
//!
//! The authority reports named events with JSON attribute payloads
//! ("Key Rotation", "Rate Limit Detected", ...). Sinks are fire-and-forget;
//! a sink that drops or fails internally is not the authority's concern.

use serde_json::Value;

/// Destination for key lifecycle events.
pub trait EventSink: Send + Sync {
    /// Record a named event with structured attributes.
    fn record(&self, event: &str, attributes: Value);

    /// Record an error with context attributes.
    fn record_error(&self, error: &dyn std::error::Error, context: Value);
}

/// Sink that emits events as structured `tracing` records under the
/// `key_events` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &str, attributes: Value) {
        tracing::info!(target: "key_events", event, attributes = %attributes, "key event");
    }

    fn record_error(&self, error: &dyn std::error::Error, context: Value) {
        tracing::error!(target: "key_events", error = %error, context = %context, "key error");
    }
}
