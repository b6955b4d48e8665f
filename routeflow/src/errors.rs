//! Error types for the routeflow engine.
//!
//! Stage-level failures are isolated by the executor and turned into error
//! events; only [`RouteflowError::CredentialPoolExhausted`] and
//! [`RouteflowError::FatalSelectionFailure`] abort a whole request.

use crate::credentials::FailureReason;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for routeflow operations.
#[derive(Debug, Error)]
pub enum RouteflowError {
    /// No candidate credential passed the health probe.
    #[error("{0}")]
    CredentialPoolExhausted(#[from] PoolExhaustedError),

    /// The mandatory selection stage exhausted its retry budget.
    #[error("Selection stage failed: {message}")]
    FatalSelectionFailure {
        /// The last error observed by the selection stage.
        message: String,
    },

    /// A non-mandatory stage failed after exhausting its retry budget.
    #[error("[{stage}] failed: {message}")]
    StageFailure {
        /// The failing stage.
        stage: String,
        /// The last error observed.
        message: String,
    },

    /// A reasoning unit's output could not be fitted into a stage contract.
    #[error("{0}")]
    SchemaCoercion(#[from] SchemaCoercionError),

    /// A shared state slot was written twice in one request.
    #[error("{0}")]
    SlotConflict(#[from] SlotConflictError),

    /// An upstream reasoning unit failed.
    #[error("{0}")]
    Reasoning(#[from] ReasoningError),

    /// A stage invocation exceeded its time budget.
    #[error("Stage '{stage}' timed out after {seconds}s")]
    Timeout {
        /// The stage that timed out.
        stage: String,
        /// The budget that was exceeded.
        seconds: f64,
    },

    /// The caller cancelled the request.
    #[error("Pipeline cancelled: {0}")]
    Cancelled(String),

    /// The stage registry does not describe a runnable pipeline.
    #[error("Invalid stage registry: {0}")]
    InvalidRegistry(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RouteflowError {
    /// Creates a stage failure error.
    #[must_use]
    pub fn stage_failure(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StageFailure {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(stage: impl Into<String>, seconds: f64) -> Self {
        Self::Timeout {
            stage: stage.into(),
            seconds,
        }
    }

    /// Returns true if this error aborts the whole request.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CredentialPoolExhausted(_) | Self::FatalSelectionFailure { .. }
        )
    }

    /// Returns the short type name used in failure records.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CredentialPoolExhausted(_) => "CredentialPoolExhausted",
            Self::FatalSelectionFailure { .. } => "FatalSelectionFailure",
            Self::StageFailure { .. } => "StageFailure",
            Self::SchemaCoercion(_) => "SchemaCoercionFailure",
            Self::SlotConflict(_) => "SlotConflict",
            Self::Reasoning(_) => "ReasoningError",
            Self::Timeout { .. } => "Timeout",
            Self::Cancelled(_) => "Cancelled",
            Self::InvalidRegistry(_) => "InvalidRegistry",
            Self::Config(_) => "ConfigError",
            Self::Serialization(_) => "SerializationError",
        }
    }
}

/// Error raised when every candidate credential failed its probe.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("All API keys are exhausted ({candidates} candidates probed, 0 working)")]
pub struct PoolExhaustedError {
    /// Number of candidates that were probed.
    pub candidates: usize,
    /// Failure reason per candidate label.
    #[serde(default)]
    pub reasons: HashMap<String, FailureReason>,
}

impl PoolExhaustedError {
    /// Creates a new pool exhausted error.
    #[must_use]
    pub fn new(candidates: usize) -> Self {
        Self {
            candidates,
            reasons: HashMap::new(),
        }
    }

    /// Adds the failure reason of one candidate.
    #[must_use]
    pub fn with_reason(mut self, label: impl Into<String>, reason: FailureReason) -> Self {
        self.reasons.insert(label.into(), reason);
        self
    }
}

/// Error raised when a value cannot be coerced into a typed stage contract.
#[derive(Debug, Clone, Error)]
#[error("Could not coerce output into '{target}': {message}")]
pub struct SchemaCoercionError {
    /// The contract the value was coerced into.
    pub target: String,
    /// What went wrong.
    pub message: String,
}

impl SchemaCoercionError {
    /// Creates a new schema coercion error.
    #[must_use]
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
        }
    }
}

/// Error raised when writing to an already written shared state slot.
#[derive(Debug, Clone, Error)]
#[error("Slot conflict: '{slot}' was already written in this request")]
pub struct SlotConflictError {
    /// The conflicting slot.
    pub slot: String,
}

impl SlotConflictError {
    /// Creates a new slot conflict error.
    #[must_use]
    pub fn new(slot: impl Into<String>) -> Self {
        Self { slot: slot.into() }
    }
}

/// Errors reported by reasoning units and credential probes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReasoningError {
    /// The credential was rejected.
    #[error("Invalid credential: {0}")]
    Unauthorized(String),

    /// The credential ran out of quota.
    #[error("Quota exceeded: {0}")]
    RateLimited(String),

    /// The backing service is overloaded.
    #[error("Service overloaded: {0}")]
    Overloaded(String),

    /// The unit produced nothing.
    #[error("Empty response from reasoning unit")]
    EmptyResponse,

    /// The unit produced something that is not usable output.
    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    /// The call failed before reaching the service.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl ReasoningError {
    /// Maps the error onto a credential failure reason.
    #[must_use]
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::Unauthorized(_) => FailureReason::Invalid,
            Self::RateLimited(_) => FailureReason::QuotaExceeded,
            Self::Overloaded(_) => FailureReason::Overloaded,
            Self::EmptyResponse => FailureReason::EmptyResponse,
            Self::InvalidOutput(_) | Self::Transport(_) => FailureReason::Unknown,
        }
    }
}
