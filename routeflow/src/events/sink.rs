//! Telemetry sinks for pipeline lifecycle events.
//!
//! These are for operators, not callers: the caller-facing stream is the
//! multiplexer. Sinks never fail the pipeline.

use parking_lot::RwLock;
use tracing::{debug, info, warn, Level};

/// Lifecycle event names.
pub mod names {
    /// The credential probe finished.
    pub const POOL_PROBED: &str = "pool.probed";
    /// A stage started.
    pub const STAGE_STARTED: &str = "stage.started";
    /// One attempt of a one-shot stage failed.
    pub const STAGE_ATTEMPT_FAILED: &str = "stage.attempt_failed";
    /// A stage finished successfully.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage failed after its retry budget.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// A stage was not activated.
    pub const STAGE_SKIPPED: &str = "stage.skipped";
    /// The request finished.
    pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
    /// The request was aborted.
    pub const PIPELINE_ABORTED: &str = "pipeline.aborted";
    /// The request was cancelled.
    pub const PIPELINE_CANCELLED: &str = "pipeline.cancelled";
}

/// Receives lifecycle events.
pub trait EventSink: Send + Sync {
    /// Emits an event. Must not block or panic.
    fn emit(&self, event_type: &str, data: serde_json::Value);
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event_type: &str, _data: serde_json::Value) {}
}

/// Logs events through `tracing`.
///
/// Failure events are always logged at `WARN`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at `level`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event_type: &str, data: serde_json::Value) {
        let failure = event_type.ends_with("failed") || event_type == names::PIPELINE_ABORTED;
        if failure {
            warn!(event_type = %event_type, event_data = %data, "Event: {}", event_type);
        } else if self.level == Level::DEBUG {
            debug!(event_type = %event_type, event_data = %data, "Event: {}", event_type);
        } else {
            info!(event_type = %event_type, event_data = %data, "Event: {}", event_type);
        }
    }
}

/// Keeps events in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(String, serde_json::Value)>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events.read().clone()
    }

    /// Returns the event names in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events.read().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Returns events with the given name.
    #[must_use]
    pub fn events_named(&self, name: &str) -> Vec<serde_json::Value> {
        self.events
            .read()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, d)| d.clone())
            .collect()
    }

    /// Returns the number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event_type: &str, data: serde_json::Value) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_and_logging_do_not_panic() {
        NoOpEventSink.emit(names::STAGE_STARTED, serde_json::json!({}));
        LoggingEventSink::default().emit(names::STAGE_FAILED, serde_json::json!({"stage": "Data"}));
        LoggingEventSink::debug().emit(names::STAGE_COMPLETED, serde_json::Value::Null);
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        sink.emit(names::STAGE_STARTED, serde_json::json!({"stage": "Context"}));
        sink.emit(names::STAGE_COMPLETED, serde_json::json!({"stage": "Context"}));
        sink.emit(names::STAGE_STARTED, serde_json::json!({"stage": "Data"}));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_named(names::STAGE_STARTED).len(), 2);
        assert_eq!(sink.names()[1], "stage.completed");
    }
}
