//! The inbound request.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The assistant.
    Assistant,
    /// System instructions.
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Assistant => f.write_str("assistant"),
            Self::System => f.write_str("system"),
        }
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The author.
    pub role: Role,
    /// The text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a new message.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// The caller's position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude.
    #[serde(alias = "latitude")]
    pub lat: f64,
    /// Longitude.
    #[serde(alias = "longitude")]
    pub lng: f64,
}

impl GeoPoint {
    /// Creates a point.
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// A single user request routed through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRequest {
    /// Correlation id, generated when absent.
    #[serde(default = "Uuid::new_v4")]
    pub request_id: Uuid,
    /// Ordered conversation so far; the last entry is the current query.
    pub conversation_history: Vec<ChatMessage>,
    /// Preferred model, passed through to the unit factory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_hint: Option<String>,
    /// Where the caller is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl PipelineRequest {
    /// Creates a request from a conversation.
    #[must_use]
    pub fn new(conversation_history: Vec<ChatMessage>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            conversation_history,
            model_hint: None,
            location: None,
        }
    }

    /// Creates a request holding a single user message.
    #[must_use]
    pub fn from_query(query: impl Into<String>) -> Self {
        Self::new(vec![ChatMessage::user(query)])
    }

    /// Sets the model hint.
    #[must_use]
    pub fn with_model_hint(mut self, hint: impl Into<String>) -> Self {
        self.model_hint = Some(hint.into());
        self
    }

    /// Sets the location.
    #[must_use]
    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    /// Returns the content of the last message, or `""` if there is none.
    #[must_use]
    pub fn latest_query(&self) -> &str {
        self.conversation_history
            .last()
            .map_or("", |m| m.content.as_str())
    }

    /// Renders the conversation as `role: content` lines.
    #[must_use]
    pub fn formatted_history(&self) -> String {
        self.conversation_history
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Renders the location for prompts.
    #[must_use]
    pub fn location_text(&self) -> String {
        self.location
            .map_or_else(|| "unknown".to_string(), |loc| loc.to_string())
    }
}
