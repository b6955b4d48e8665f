//! The shared state threaded between stages.

use serde::Serialize;

use crate::contracts::{
    ActionReport, ContextIntent, DataReport, ReasoningDecision, SelectionDecision,
};
use crate::core::{StageName, StageOutput};
use crate::errors::SlotConflictError;
use crate::pipeline::{ErrorPolicy, StageFailureRecord};

/// Per-request accumulator of typed stage outputs.
///
/// Each structured slot is written at most once. Stages only ever see clones
/// of it; the scheduler owns the live copy. The transient `plan` and
/// `summary` texts are not part of the serialized slot schema.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SharedState {
    #[serde(skip_serializing_if = "Option::is_none")]
    orchestrator: Option<SelectionDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<ContextIntent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<DataReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<ReasoningDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<ActionReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<StageFailureRecord>,
    #[serde(skip)]
    plan: Option<String>,
    #[serde(skip)]
    summary: Option<String>,
    #[serde(skip)]
    error_policy: ErrorPolicy,
}

fn fill<T>(slot: &mut Option<T>, name: &str, value: T) -> Result<(), SlotConflictError> {
    if slot.is_some() {
        return Err(SlotConflictError::new(name));
    }
    *slot = Some(value);
    Ok(())
}

impl SharedState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how failures are kept.
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Writes a stage output into its slot.
    ///
    /// # Errors
    ///
    /// Returns [`SlotConflictError`] if the slot was already written.
    pub fn record(&mut self, output: StageOutput) -> Result<(), SlotConflictError> {
        match output {
            StageOutput::Selection(v) => fill(&mut self.orchestrator, "orchestrator", v),
            StageOutput::Context(v) => fill(&mut self.context, "context", v),
            StageOutput::Data(v) => fill(&mut self.data, "data", v),
            StageOutput::Reasoning(v) => fill(&mut self.reasoning, "reasoning", v),
            StageOutput::Action(v) => fill(&mut self.action, "action", v),
        }
    }

    /// Records a failure according to the error policy.
    pub fn record_error(&mut self, record: StageFailureRecord) {
        if self.error_policy == ErrorPolicy::LastWriteWins {
            self.errors.clear();
        }
        self.errors.push(record);
    }

    /// Stores the plan announcement text.
    pub fn set_plan(&mut self, text: impl Into<String>) {
        self.plan = Some(text.into());
    }

    /// Stores the final summary text.
    pub fn set_summary(&mut self, text: impl Into<String>) {
        self.summary = Some(text.into());
    }

    /// The selection decision.
    #[must_use]
    pub fn orchestrator(&self) -> Option<&SelectionDecision> {
        self.orchestrator.as_ref()
    }

    /// The context intent.
    #[must_use]
    pub fn context(&self) -> Option<&ContextIntent> {
        self.context.as_ref()
    }

    /// The data report.
    #[must_use]
    pub fn data(&self) -> Option<&DataReport> {
        self.data.as_ref()
    }

    /// The reasoning decision.
    #[must_use]
    pub fn reasoning(&self) -> Option<&ReasoningDecision> {
        self.reasoning.as_ref()
    }

    /// The action report.
    #[must_use]
    pub fn action(&self) -> Option<&ActionReport> {
        self.action.as_ref()
    }

    /// Every recorded failure, oldest first.
    #[must_use]
    pub fn errors(&self) -> &[StageFailureRecord] {
        &self.errors
    }

    /// The most recent failure.
    #[must_use]
    pub fn latest_error(&self) -> Option<&StageFailureRecord> {
        self.errors.last()
    }

    /// The plan announcement text.
    #[must_use]
    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }

    /// The final summary text.
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Returns true if `stage` has written its slot.
    #[must_use]
    pub fn has_slot(&self, stage: StageName) -> bool {
        match stage {
            StageName::Orchestrator => self.orchestrator.is_some(),
            StageName::Context => self.context.is_some(),
            StageName::Data => self.data.is_some(),
            StageName::Reasoning => self.reasoning.is_some(),
            StageName::Action => self.action.is_some(),
            StageName::Plan | StageName::Summary => false,
        }
    }

    /// Returns a stage's slot as JSON, or `Null` if unwritten.
    #[must_use]
    pub fn slot_value(&self, stage: StageName) -> serde_json::Value {
        let value = match stage {
            StageName::Orchestrator => self.orchestrator.as_ref().map(serde_json::to_value),
            StageName::Context => self.context.as_ref().map(serde_json::to_value),
            StageName::Data => self.data.as_ref().map(serde_json::to_value),
            StageName::Reasoning => self.reasoning.as_ref().map(serde_json::to_value),
            StageName::Action => self.action.as_ref().map(serde_json::to_value),
            StageName::Plan | StageName::Summary => None,
        };
        value
            .and_then(Result::ok)
            .unwrap_or(serde_json::Value::Null)
    }

    /// Serializes the slots for inclusion in a prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if a slot cannot be represented as JSON.
    pub fn to_prompt_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
