//! Typed output of one-shot stages.

use super::StageName;
use crate::contracts::{ActionReport, ContextIntent, DataReport, ReasoningDecision, SelectionDecision};

/// The structured result of a one-shot stage.
///
/// Each variant corresponds to exactly one shared state slot, so the
/// accumulator's shape is known statically.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    /// Output of the selection stage.
    Selection(SelectionDecision),
    /// Output of the context stage.
    Context(ContextIntent),
    /// Output of the data stage.
    Data(DataReport),
    /// Output of the reasoning stage.
    Reasoning(ReasoningDecision),
    /// Output of the action stage.
    Action(ActionReport),
}

impl StageOutput {
    /// Returns the stage that owns this output's slot.
    #[must_use]
    pub fn stage(&self) -> StageName {
        match self {
            Self::Selection(_) => StageName::Orchestrator,
            Self::Context(_) => StageName::Context,
            Self::Data(_) => StageName::Data,
            Self::Reasoning(_) => StageName::Reasoning,
            Self::Action(_) => StageName::Action,
        }
    }

    /// Serializes the payload for event emission.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be represented as JSON.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::Selection(v) => serde_json::to_value(v),
            Self::Context(v) => serde_json::to_value(v),
            Self::Data(v) => serde_json::to_value(v),
            Self::Reasoning(v) => serde_json::to_value(v),
            Self::Action(v) => serde_json::to_value(v),
        }
    }

    /// Returns the selection decision, if this is the selection output.
    #[must_use]
    pub fn as_selection(&self) -> Option<&SelectionDecision> {
        match self {
            Self::Selection(decision) => Some(decision),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::AgentKind;

    #[test]
    fn test_output_stage_mapping() {
        let output = StageOutput::Selection(SelectionDecision::new(
            vec![AgentKind::ContextAgent],
            "needs intent",
        ));

        assert_eq!(output.stage(), StageName::Orchestrator);
        assert!(output.as_selection().is_some());
    }

    #[test]
    fn test_output_to_value() {
        let output = StageOutput::Selection(SelectionDecision::new(vec![], "chit-chat"));
        let value = output.to_value().unwrap();

        assert_eq!(value["agentsToUse"], serde_json::json!([]));
        assert_eq!(value["reasoning"], "chit-chat");
    }
}
