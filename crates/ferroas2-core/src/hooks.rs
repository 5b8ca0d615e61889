//! Hooks for lifecycle notifications
//!
//! The engine reports protocol lifecycle events through [`EventSink`] without
//! depending on how, or whether, they are recorded. Publishing never blocks and
//! never fails from the caller's point of view.

use std::fmt;

use serde::Serialize;

/// Protocol phase an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    FileSend,
    FileReceive,
    MdnSend,
    MdnReceive,
    MdnAsyncReceive,
    Scheduler,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::FileSend => "FILE_SEND",
            Phase::FileReceive => "FILE_RECEIVE",
            Phase::MdnSend => "MDN_SEND",
            Phase::MdnReceive => "MDN_RECEIVE",
            Phase::MdnAsyncReceive => "MDN_ASYNC_RECEIVE",
            Phase::Scheduler => "SCHEDULER",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerEvent {
    pub level: EventLevel,
    pub phase: Phase,
    pub message_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Sink for lifecycle events
///
/// Implementations must return quickly; the engine calls this inline from pipeline
/// stages.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: ServerEvent);

    fn info(&self, phase: Phase, message_id: &str, text: &str) {
        self.publish(ServerEvent {
            level: EventLevel::Info,
            phase,
            message_id: message_id.to_string(),
            text: text.to_string(),
            error: None,
        });
    }

    fn error(&self, phase: Phase, message_id: &str, text: &str, error: Option<&str>) {
        self.publish(ServerEvent {
            level: EventLevel::Error,
            phase,
            message_id: message_id.to_string(),
            text: text.to_string(),
            error: error.map(str::to_string),
        });
    }
}

/// No-op implementation for when events are not recorded
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn publish(&self, _event: ServerEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collecting(Mutex<Vec<ServerEvent>>);

    impl EventSink for Collecting {
        fn publish(&self, event: ServerEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_default_methods_fill_event() {
        let sink = Collecting::default();
        sink.info(Phase::FileSend, "<m1>", "Starting to send file");
        sink.error(Phase::MdnReceive, "<m1>", "MIC mismatch", Some("expected x"));

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, EventLevel::Info);
        assert_eq!(events[0].phase, Phase::FileSend);
        assert_eq!(events[1].level, EventLevel::Error);
        assert_eq!(events[1].error.as_deref(), Some("expected x"));
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::MdnAsyncReceive.to_string(), "MDN_ASYNC_RECEIVE");
        assert_eq!(
            serde_json::to_string(&Phase::FileReceive).unwrap(),
            "\"FILE_RECEIVE\""
        );
    }
}
