//! The context stage's structured intent.

use serde::{Deserialize, Serialize};

use super::Contract;

/// Parameters extracted from the conversation.
///
/// Field names are snake_case on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentParameters {
    /// Kind of place or item, e.g. "coffee shop".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Location in `lat,lng` form when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Search radius in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    /// Time context such as "now" or "tomorrow".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// The most valuable constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Navigation start point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Navigation end point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Mode of transport, e.g. "driving".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_mode: Option<String>,
}

/// What the user wants and which data sources downstream stages need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextIntent {
    /// Short intent label, e.g. `navigate` or `find_places`.
    pub intent: String,
    /// Extracted parameters.
    #[serde(default)]
    pub parameters: IntentParameters,
    /// Data sources to consult, e.g. `["places", "weather"]`.
    #[serde(default)]
    pub required_data: Vec<String>,
    /// How the intent was determined.
    #[serde(default)]
    pub reasoning: String,
}

impl ContextIntent {
    /// Creates an intent with no parameters.
    #[must_use]
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            parameters: IntentParameters::default(),
            required_data: Vec::new(),
            reasoning: String::new(),
        }
    }

    /// Sets the parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: IntentParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Adds a required data source.
    #[must_use]
    pub fn with_required_data(mut self, source: impl Into<String>) -> Self {
        self.required_data.push(source.into());
        self
    }

    /// Sets the rationale.
    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }
}

impl Contract for ContextIntent {
    const NAME: &'static str = "context_intent";
}
