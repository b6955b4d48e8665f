//! Pipeline events delivered to the caller.

use super::StageName;
use serde::{Serialize, Serializer};

/// A tagged message in the merged response stream.
///
/// Serializes to the caller-facing wire shape:
/// `{"type": "stage", "stage": "Context", "agentData": ..., "input": ...}` for
/// structured stage results, `{"type": "error", "stage": "Error", "agentData": "..."}`
/// for errors, and `{"type": "token", "stage": "Summary", "delta": "..."}` for
/// interaction tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// A one-shot stage finished with a structured payload.
    Stage {
        /// The producing stage.
        stage: StageName,
        /// The stage's structured output.
        agent_data: serde_json::Value,
        /// The upstream payload the stage consumed.
        input: serde_json::Value,
    },
    /// A stage (or the whole request) failed.
    Error {
        /// The failing stage; `None` for request-level failures.
        origin: Option<StageName>,
        /// Human readable message.
        message: String,
    },
    /// A chunk of an interaction stage's token stream.
    Token {
        /// The streaming stage.
        stage: StageName,
        /// The text chunk.
        delta: String,
    },
}

impl PipelineEvent {
    /// Creates a structured stage event.
    #[must_use]
    pub fn stage(stage: StageName, agent_data: serde_json::Value, input: serde_json::Value) -> Self {
        Self::Stage {
            stage,
            agent_data,
            input,
        }
    }

    /// Creates an error event tagged with the failing stage.
    #[must_use]
    pub fn stage_error(stage: StageName, message: impl Into<String>) -> Self {
        Self::Error {
            origin: Some(stage),
            message: message.into(),
        }
    }

    /// Creates a request-level error event.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Error {
            origin: None,
            message: message.into(),
        }
    }

    /// Creates a token event.
    #[must_use]
    pub fn token(stage: StageName, delta: impl Into<String>) -> Self {
        Self::Token {
            stage,
            delta: delta.into(),
        }
    }

    /// Returns the stage this event belongs to, if any.
    #[must_use]
    pub fn stage_name(&self) -> Option<StageName> {
        match self {
            Self::Stage { stage, .. } | Self::Token { stage, .. } => Some(*stage),
            Self::Error { origin, .. } => *origin,
        }
    }

    /// Returns true for error events.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Returns true for token events.
    #[must_use]
    pub fn is_token(&self) -> bool {
        matches!(self, Self::Token { .. })
    }

    /// Converts the event to its wire representation.
    #[must_use]
    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            Self::Stage {
                stage,
                agent_data,
                input,
            } => serde_json::json!({
                "type": "stage",
                "stage": stage.as_str(),
                "agentData": agent_data,
                "input": input,
            }),
            Self::Error { origin, message } => {
                let mut map = serde_json::Map::new();
                map.insert("type".to_string(), serde_json::json!("error"));
                map.insert("stage".to_string(), serde_json::json!("Error"));
                map.insert("agentData".to_string(), serde_json::json!(message));
                if let Some(origin) = origin {
                    map.insert("origin".to_string(), serde_json::json!(origin.as_str()));
                }
                serde_json::Value::Object(map)
            }
            Self::Token { stage, delta } => serde_json::json!({
                "type": "token",
                "stage": stage.as_str(),
                "delta": delta,
            }),
        }
    }
}

impl Serialize for PipelineEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_wire().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stage_event_wire_shape() {
        let event = PipelineEvent::stage(
            StageName::Context,
            serde_json::json!({"intent": "navigate"}),
            serde_json::json!({"agentsToUse": ["ContextAgent"]}),
        );

        assert_eq!(
            event.to_wire(),
            serde_json::json!({
                "type": "stage",
                "stage": "Context",
                "agentData": {"intent": "navigate"},
                "input": {"agentsToUse": ["ContextAgent"]},
            })
        );
    }

    #[test]
    fn test_error_event_wire_shape() {
        let event = PipelineEvent::stage_error(StageName::Data, "[Data] failed: bad schema");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "error");
        assert_eq!(json["stage"], "Error");
        assert_eq!(json["origin"], "Data");
        assert_eq!(json["agentData"], "[Data] failed: bad schema");
        assert_eq!(event.stage_name(), Some(StageName::Data));
    }

    #[test]
    fn test_fatal_event_has_no_origin() {
        let event = PipelineEvent::fatal("All API keys are exhausted");
        let json = event.to_wire();

        assert!(json.get("origin").is_none());
        assert!(event.is_error());
        assert_eq!(event.stage_name(), None);
    }

    #[test]
    fn test_token_event() {
        let event = PipelineEvent::token(StageName::Summary, "Hello");
        assert!(event.is_token());
        assert_eq!(
            event.to_wire(),
            serde_json::json!({"type": "token", "stage": "Summary", "delta": "Hello"})
        );
    }
}
