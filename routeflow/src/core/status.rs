//! Stage names, execution modes and the per-request phase machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a stage produces its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageMode {
    /// Produces one structured value; eligible for credential-rotation retry.
    OneShot,
    /// Produces an incremental token sequence; run exactly once.
    Streaming,
}

impl fmt::Display for StageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneShot => write!(f, "one-shot"),
            Self::Streaming => write!(f, "streaming"),
        }
    }
}

/// The stable name of a stage in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageName {
    /// The mandatory selection stage.
    Orchestrator,
    /// The interaction stage announcing the plan.
    Plan,
    /// Intent extraction.
    Context,
    /// Data fetching and structured extraction.
    Data,
    /// Option ranking and selection.
    Reasoning,
    /// Map commands.
    Action,
    /// The interaction stage producing the final answer.
    Summary,
}

impl StageName {
    /// All stage names in pipeline order.
    pub const ALL: [Self; 7] = [
        Self::Orchestrator,
        Self::Plan,
        Self::Context,
        Self::Data,
        Self::Reasoning,
        Self::Action,
        Self::Summary,
    ];

    /// Returns the wire name of the stage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orchestrator => "Orchestrator",
            Self::Plan => "Plan",
            Self::Context => "Context",
            Self::Data => "Data",
            Self::Reasoning => "Reasoning",
            Self::Action => "Action",
            Self::Summary => "Summary",
        }
    }

    /// Returns the shared state slot this stage writes, if any.
    #[must_use]
    pub fn slot(&self) -> Option<&'static str> {
        match self {
            Self::Orchestrator => Some("orchestrator"),
            Self::Context => Some("context"),
            Self::Data => Some("data"),
            Self::Reasoning => Some("reasoning"),
            Self::Action => Some("action"),
            Self::Plan | Self::Summary => None,
        }
    }

    /// Returns the phase the pipeline is in while this stage runs.
    #[must_use]
    pub fn phase(&self) -> PipelinePhase {
        match self {
            Self::Orchestrator => PipelinePhase::Selecting,
            Self::Plan => PipelinePhase::Planning,
            Self::Context => PipelinePhase::Context,
            Self::Data => PipelinePhase::Data,
            Self::Reasoning => PipelinePhase::Reasoning,
            Self::Action => PipelinePhase::Action,
            Self::Summary => PipelinePhase::Summarizing,
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a request is in its strictly forward pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    /// Not started.
    #[default]
    Idle,
    /// Running the selection stage.
    Selecting,
    /// Announcing the plan.
    Planning,
    /// Running the context stage.
    Context,
    /// Running the data stage.
    Data,
    /// Running the reasoning stage.
    Reasoning,
    /// Running the action stage.
    Action,
    /// Streaming the final summary.
    Summarizing,
    /// Finished, possibly with isolated stage errors.
    Done,
    /// Aborted by a fatal selection or credential failure.
    Aborted,
    /// Stopped by the caller.
    Cancelled,
}

impl PipelinePhase {
    /// Returns true if the phase is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted | Self::Cancelled)
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Selecting => "selecting",
            Self::Planning => "planning",
            Self::Context => "context",
            Self::Data => "data",
            Self::Reasoning => "reasoning",
            Self::Action => "action",
            Self::Summarizing => "summarizing",
            Self::Done => "done",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_fixed() {
        let mut sorted = StageName::ALL;
        sorted.sort();
        assert_eq!(sorted, StageName::ALL);
    }

    #[test]
    fn test_interaction_stages_have_no_slot() {
        assert_eq!(StageName::Plan.slot(), None);
        assert_eq!(StageName::Summary.slot(), None);
        assert_eq!(StageName::Data.slot(), Some("data"));
    }

    #[test]
    fn test_phase_terminal() {
        assert!(PipelinePhase::Done.is_terminal());
        assert!(PipelinePhase::Aborted.is_terminal());
        assert!(PipelinePhase::Cancelled.is_terminal());
        assert!(!StageName::Summary.phase().is_terminal());
    }

    #[test]
    fn test_stage_name_serialize() {
        let json = serde_json::to_string(&StageName::Reasoning).unwrap();
        assert_eq!(json, r#""Reasoning""#);
        assert_eq!(StageMode::OneShot.to_string(), "one-shot");
    }
}
