//! Stage failure records and how the shared state keeps them.

use serde::{Deserialize, Serialize};

use crate::core::StageName;
use crate::utils::iso_timestamp;

/// How the shared state's `errors` slot treats successive failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Keep every failure in order.
    #[default]
    Accumulate,
    /// Keep only the most recent failure.
    LastWriteWins,
}

/// Record of one stage failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailureRecord {
    /// The failing stage.
    pub stage: StageName,
    /// Sanitized message as emitted to the caller.
    pub message: String,
    /// Error kind, e.g. `SchemaCoercionFailure`.
    pub error_type: String,
    /// Attempts made before giving up.
    pub attempts: usize,
    /// When the failure was recorded.
    pub timestamp: String,
}

impl StageFailureRecord {
    /// Creates a failure record.
    #[must_use]
    pub fn new(stage: StageName, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            error_type: "StageFailure".to_string(),
            attempts: 1,
            timestamp: iso_timestamp(),
        }
    }

    /// Sets the error type.
    #[must_use]
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = error_type.into();
        self
    }

    /// Sets the attempt count.
    #[must_use]
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_accumulates() {
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Accumulate);
        let json = serde_json::to_string(&ErrorPolicy::LastWriteWins).unwrap();
        assert_eq!(json, r#""last_write_wins""#);
    }

    #[test]
    fn test_record_builder() {
        let record = StageFailureRecord::new(StageName::Data, "[Data] failed: bad shape")
            .with_error_type("SchemaCoercionFailure")
            .with_attempts(3);

        assert_eq!(record.stage, StageName::Data);
        assert_eq!(record.attempts, 3);
        assert!(record.timestamp.contains('T'));
    }
}
