//! Event delivery.
//!
//! This module provides:
//! - The multiplexer that carries pipeline events to the caller in order
//! - Telemetry sinks for pipeline lifecycle events

mod multiplexer;
mod sink;

pub use multiplexer::{channel, EventStream, EventWriter};
pub use sink::{names, CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
