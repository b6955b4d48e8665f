//! The append-only state log collaborator.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::PipelinePhase;
use crate::utils::iso_timestamp;

/// A finished request's state as handed to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    /// The request.
    pub request_id: Uuid,
    /// When the request finished.
    pub timestamp: String,
    /// Terminal phase.
    pub phase: PipelinePhase,
    /// The serialized shared state.
    pub state: serde_json::Value,
}

impl StateRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(request_id: Uuid, phase: PipelinePhase, state: serde_json::Value) -> Self {
        Self {
            request_id,
            timestamp: iso_timestamp(),
            phase,
            state,
        }
    }
}

/// Receives the final state of every request.
///
/// Injected per pipeline; the engine keeps nothing across requests itself.
#[async_trait]
pub trait StateLog: Send + Sync {
    /// Appends a record. Failures are the log's own concern.
    async fn append(&self, record: StateRecord);
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStateLog;

#[async_trait]
impl StateLog for NoOpStateLog {
    async fn append(&self, _record: StateRecord) {}
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct InMemoryStateLog {
    records: RwLock<Vec<StateRecord>>,
}

impl InMemoryStateLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all records.
    #[must_use]
    pub fn records(&self) -> Vec<StateRecord> {
        self.records.read().clone()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl StateLog for InMemoryStateLog {
    async fn append(&self, record: StateRecord) {
        self.records.write().push(record);
    }
}
