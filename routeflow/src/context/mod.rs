//! Per-request context.
//!
//! This module provides:
//! - The inbound request and its conversation
//! - The write-once shared state threaded between stages
//! - The state log collaborator that receives finished states

mod log;
mod request;
mod state;

pub use log::{InMemoryStateLog, NoOpStateLog, StateLog, StateRecord};
pub use request::{ChatMessage, GeoPoint, PipelineRequest, Role};
pub use state::SharedState;
