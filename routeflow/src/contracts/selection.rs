//! The selection stage's decision.

use serde::{Deserialize, Serialize};

use super::Contract;
use crate::core::StageName;

/// The closed vocabulary of activatable stages.
///
/// Unknown names are rejected during deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    /// Intent extraction.
    ContextAgent,
    /// Data fetching.
    DataAgent,
    /// Option ranking.
    ReasoningAgent,
    /// Map commands.
    ActionAgent,
}

impl AgentKind {
    /// Every activatable stage, in pipeline order.
    pub const ALL: [Self; 4] = [
        Self::ContextAgent,
        Self::DataAgent,
        Self::ReasoningAgent,
        Self::ActionAgent,
    ];

    /// Returns the stage this agent activates.
    #[must_use]
    pub fn stage(&self) -> StageName {
        match self {
            Self::ContextAgent => StageName::Context,
            Self::DataAgent => StageName::Data,
            Self::ReasoningAgent => StageName::Reasoning,
            Self::ActionAgent => StageName::Action,
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContextAgent => "ContextAgent",
            Self::DataAgent => "DataAgent",
            Self::ReasoningAgent => "ReasoningAgent",
            Self::ActionAgent => "ActionAgent",
        }
    }
}

/// Which stages to activate for this request, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionDecision {
    /// Stages to activate. Order is advisory; the pipeline order is fixed.
    pub agents_to_use: Vec<AgentKind>,
    /// Free-form rationale.
    #[serde(default)]
    pub reasoning: String,
}

impl SelectionDecision {
    /// Creates a new decision.
    #[must_use]
    pub fn new(agents_to_use: Vec<AgentKind>, reasoning: impl Into<String>) -> Self {
        Self {
            agents_to_use,
            reasoning: reasoning.into(),
        }
    }

    /// Returns true if `agent` was selected.
    #[must_use]
    pub fn selects(&self, agent: AgentKind) -> bool {
        self.agents_to_use.contains(&agent)
    }

    /// Returns true if no stage was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents_to_use.is_empty()
    }
}

impl Contract for SelectionDecision {
    const NAME: &'static str = "selection_decision";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_deserialize() {
        let decision = SelectionDecision::coerce(serde_json::json!({
            "agentsToUse": ["ContextAgent", "DataAgent"],
            "reasoning": "navigation request"
        }))
        .unwrap();

        assert!(decision.selects(AgentKind::ContextAgent));
        assert!(decision.selects(AgentKind::DataAgent));
        assert!(!decision.selects(AgentKind::ActionAgent));
    }

    #[test]
    fn test_unknown_agent_rejected() {
        let result = SelectionDecision::coerce(serde_json::json!({
            "agentsToUse": ["WeatherAgent"],
            "reasoning": ""
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_agent_stage_mapping() {
        let stages: Vec<_> = AgentKind::ALL.iter().map(AgentKind::stage).collect();
        assert_eq!(
            stages,
            vec![
                StageName::Context,
                StageName::Data,
                StageName::Reasoning,
                StageName::Action
            ]
        );
    }

    #[test]
    fn test_empty_selection() {
        let decision = SelectionDecision::new(vec![], "greeting");
        assert!(decision.is_empty());
    }
}
