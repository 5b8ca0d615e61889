//! Event sink that writes lifecycle events to the tracing log.

use ferroas2_core::{EventLevel, EventSink, ServerEvent};

/// Publishes every [`ServerEvent`] as a structured tracing event.
///
/// Info events are logged at `INFO`, error events at `ERROR`, both under the
/// `ferroas2::events` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: ServerEvent) {
        let error = event.error.as_deref().unwrap_or_default();
        match event.level {
            EventLevel::Info => tracing::info!(
                target: "ferroas2::events",
                phase = %event.phase,
                message_id = %event.message_id,
                "{}",
                event.text
            ),
            EventLevel::Error => tracing::error!(
                target: "ferroas2::events",
                phase = %event.phase,
                message_id = %event.message_id,
                error = %error,
                "{}",
                event.text
            ),
        }
    }
}
