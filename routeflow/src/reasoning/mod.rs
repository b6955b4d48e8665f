//! The reasoning-unit interface consumed by stages.
//!
//! A reasoning unit is an opaque callable bound to one credential. It either
//! returns a structured JSON value (`generate`) or opens an incremental token
//! stream (`stream`). How it computes the answer is not routeflow's concern.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;

use crate::context::ChatMessage;
use crate::credentials::Credential;
use crate::errors::ReasoningError;

/// An incremental text stream produced by a reasoning unit.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, ReasoningError>> + Send>>;

/// Task names sent with every call, letting a unit pick its tools and model.
pub mod tasks {
    /// Stage selection.
    pub const ORCHESTRATOR: &str = "orchestrator";
    /// Plan announcement.
    pub const PLAN: &str = "interaction.plan";
    /// Final summary.
    pub const SUMMARY: &str = "interaction.summary";
    /// Intent extraction.
    pub const CONTEXT: &str = "context";
    /// Free-form data gathering.
    pub const DATA_EXTRACT: &str = "data.extract";
    /// Schema coercion of the data digest.
    pub const DATA_COERCE: &str = "data.coerce";
    /// Option ranking.
    pub const REASONING: &str = "reasoning";
    /// Map commands.
    pub const ACTION: &str = "action";
    /// Credential health check.
    pub const HEALTH: &str = "health";
}

/// A one-shot request to a reasoning unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// One of the [`tasks`] names.
    pub task: String,
    /// System instructions.
    pub system: String,
    /// The user-side prompt text.
    pub text: String,
    /// Name of the contract the output must fit, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl Prompt {
    /// Creates a prompt.
    #[must_use]
    pub fn new(task: impl Into<String>, system: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            system: system.into(),
            text: text.into(),
            schema: None,
        }
    }

    /// Sets the output contract name.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

/// A streaming request to a reasoning unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRequest {
    /// One of the [`tasks`] names.
    pub task: String,
    /// System instructions.
    pub system: String,
    /// Conversation to continue.
    pub messages: Vec<ChatMessage>,
}

impl StreamRequest {
    /// Creates a streaming request.
    #[must_use]
    pub fn new(task: impl Into<String>, system: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            task: task.into(),
            system: system.into(),
            messages,
        }
    }
}

/// A reasoning unit bound to one credential.
#[async_trait]
pub trait ReasoningUnit: Send + Sync {
    /// Produces a single structured value.
    async fn generate(&self, prompt: &Prompt) -> Result<serde_json::Value, ReasoningError>;

    /// Opens an incremental token stream.
    async fn stream(&self, request: &StreamRequest) -> Result<TokenStream, ReasoningError>;
}

/// Binds credentials to reasoning units.
///
/// Called once per attempt; the returned unit must only use the given credential.
pub trait ReasoningUnitFactory: Send + Sync {
    /// Creates a unit for `credential`, honoring the caller's model hint when possible.
    fn create(&self, credential: &Credential, model_hint: Option<&str>) -> Arc<dyn ReasoningUnit>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_builder() {
        let prompt = Prompt::new(tasks::CONTEXT, "system", "text").with_schema("context_intent");
        assert_eq!(prompt.schema.as_deref(), Some("context_intent"));

        let json = serde_json::to_value(&prompt).unwrap();
        assert_eq!(json["task"], "context");
    }

    #[test]
    fn test_prompt_without_schema_omits_field() {
        let json = serde_json::to_value(Prompt::new(tasks::DATA_EXTRACT, "", "")).unwrap();
        assert!(json.get("schema").is_none());
    }
}
