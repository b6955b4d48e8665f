//! Stage traits, descriptors and the built-in stages.
//!
//! A stage is either one-shot (returns a typed [`StageOutput`] and may be
//! retried on another credential) or streaming (opens a token stream and
//! runs exactly once). Stages are built fresh per request from immutable
//! [`StageDescriptor`]s held by a [`StageRegistry`].

mod agents;
pub mod prompts;
mod registry;

pub use agents::{
    ActionStage, ContextStage, DataStage, InteractionMode, InteractionStage, ReasoningStage,
    SelectionStage,
};
pub use registry::StageRegistry;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::context::{PipelineRequest, SharedState};
use crate::contracts::{AgentKind, SelectionDecision};
use crate::core::{StageMode, StageName, StageOutput};
use crate::errors::RouteflowError;
use crate::reasoning::{ReasoningUnit, TokenStream};

/// What a stage sees: the request and a read-only snapshot of the state.
#[derive(Debug, Clone)]
pub struct StageContext {
    request: Arc<PipelineRequest>,
    state: SharedState,
}

impl StageContext {
    /// Creates a context.
    #[must_use]
    pub fn new(request: Arc<PipelineRequest>, state: SharedState) -> Self {
        Self { request, state }
    }

    /// The request.
    #[must_use]
    pub fn request(&self) -> &PipelineRequest {
        &self.request
    }

    /// The state snapshot.
    #[must_use]
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// The state rendered as JSON for prompts.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if a slot cannot be represented.
    pub fn state_json(&self) -> Result<String, RouteflowError> {
        Ok(self.state.to_prompt_json()?)
    }
}

/// A stage producing one structured value.
#[async_trait]
pub trait StructuredStage: Send + Sync + Debug {
    /// Runs the stage once with the given unit.
    async fn run(
        &self,
        unit: &dyn ReasoningUnit,
        ctx: &StageContext,
    ) -> Result<StageOutput, RouteflowError>;
}

/// A stage producing a token stream.
#[async_trait]
pub trait StreamingStage: Send + Sync + Debug {
    /// Opens the stage's stream with the given unit.
    async fn open(
        &self,
        unit: &dyn ReasoningUnit,
        ctx: &StageContext,
    ) -> Result<TokenStream, RouteflowError>;
}

/// A stage instance of either mode.
#[derive(Debug, Clone)]
pub enum StageRunner {
    /// One-shot.
    OneShot(Arc<dyn StructuredStage>),
    /// Streaming.
    Streaming(Arc<dyn StreamingStage>),
}

impl StageRunner {
    /// The execution mode.
    #[must_use]
    pub fn mode(&self) -> StageMode {
        match self {
            Self::OneShot(_) => StageMode::OneShot,
            Self::Streaming(_) => StageMode::Streaming,
        }
    }
}

/// When a stage runs, as a pure function of the selection decision.
#[derive(Clone, Copy)]
pub enum Activation {
    /// Always.
    Always,
    /// When this agent was selected.
    WhenSelected(AgentKind),
    /// When at least one agent was selected.
    WhenAnySelected,
    /// Custom predicate.
    Predicate(fn(&SelectionDecision) -> bool),
}

impl Activation {
    /// Evaluates the predicate.
    #[must_use]
    pub fn is_active(&self, decision: &SelectionDecision) -> bool {
        match self {
            Self::Always => true,
            Self::WhenSelected(agent) => decision.selects(*agent),
            Self::WhenAnySelected => !decision.is_empty(),
            Self::Predicate(predicate) => predicate(decision),
        }
    }
}

impl Debug for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::WhenSelected(agent) => f.debug_tuple("WhenSelected").field(agent).finish(),
            Self::WhenAnySelected => f.write_str("WhenAnySelected"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Which upstream payload a stage's event echoes as `input`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// `{"query": <latest message>}`.
    Query,
    /// The JSON of a previously written slot.
    Slot(StageName),
    /// Nothing.
    None,
}

impl InputSource {
    /// Resolves the payload against a request and state.
    #[must_use]
    pub fn resolve(&self, request: &PipelineRequest, state: &SharedState) -> serde_json::Value {
        match self {
            Self::Query => serde_json::json!({ "query": request.latest_query() }),
            Self::Slot(stage) => state.slot_value(*stage),
            Self::None => serde_json::Value::Null,
        }
    }
}

type RunnerFactory = Arc<dyn Fn() -> StageRunner + Send + Sync>;

/// Immutable description of a stage.
#[derive(Clone)]
pub struct StageDescriptor {
    name: StageName,
    mode: StageMode,
    activation: Activation,
    input: InputSource,
    factory: RunnerFactory,
}

impl StageDescriptor {
    /// Describes a one-shot stage.
    pub fn one_shot<F, S>(name: StageName, activation: Activation, build: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: StructuredStage + 'static,
    {
        Self {
            name,
            mode: StageMode::OneShot,
            activation,
            input: InputSource::None,
            factory: Arc::new(move || StageRunner::OneShot(Arc::new(build()))),
        }
    }

    /// Describes a streaming stage.
    pub fn streaming<F, S>(name: StageName, activation: Activation, build: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: StreamingStage + 'static,
    {
        Self {
            name,
            mode: StageMode::Streaming,
            activation,
            input: InputSource::None,
            factory: Arc::new(move || StageRunner::Streaming(Arc::new(build()))),
        }
    }

    /// Sets the echoed input.
    #[must_use]
    pub fn with_input(mut self, input: InputSource) -> Self {
        self.input = input;
        self
    }

    /// The stage name.
    #[must_use]
    pub fn name(&self) -> StageName {
        self.name
    }

    /// The execution mode.
    #[must_use]
    pub fn mode(&self) -> StageMode {
        self.mode
    }

    /// The activation predicate.
    #[must_use]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// The echoed input.
    #[must_use]
    pub fn input(&self) -> InputSource {
        self.input
    }

    /// Builds a fresh stage instance.
    #[must_use]
    pub fn instantiate(&self) -> StageRunner {
        (self.factory)()
    }
}

impl Debug for StageDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageDescriptor")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("activation", &self.activation)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation() {
        let decision = SelectionDecision::new(vec![AgentKind::DataAgent], "data");
        let empty = SelectionDecision::new(vec![], "");

        assert!(Activation::Always.is_active(&empty));
        assert!(Activation::WhenSelected(AgentKind::DataAgent).is_active(&decision));
        assert!(!Activation::WhenSelected(AgentKind::ContextAgent).is_active(&decision));
        assert!(Activation::WhenAnySelected.is_active(&decision));
        assert!(!Activation::WhenAnySelected.is_active(&empty));
        assert!(!Activation::Predicate(|d| d.agents_to_use.len() > 1).is_active(&decision));
    }

    #[test]
    fn test_input_source_resolve() {
        let request = PipelineRequest::from_query("route to airport");
        let mut state = SharedState::new();
        state
            .record(StageOutput::Selection(SelectionDecision::new(
                vec![AgentKind::ContextAgent],
                "nav",
            )))
            .unwrap();

        assert_eq!(
            InputSource::Query.resolve(&request, &state),
            serde_json::json!({"query": "route to airport"})
        );
        assert_eq!(
            InputSource::Slot(StageName::Orchestrator).resolve(&request, &state)["reasoning"],
            "nav"
        );
        assert!(InputSource::Slot(StageName::Context).resolve(&request, &state).is_null());
    }

    #[test]
    fn test_descriptor_instantiates_fresh_runner() {
        let descriptor = StageDescriptor::one_shot(StageName::Context, Activation::Always, ContextStage::new);
        let a = descriptor.instantiate();
        let b = descriptor.instantiate();

        assert_eq!(a.mode(), StageMode::OneShot);
        match (a, b) {
            (StageRunner::OneShot(a), StageRunner::OneShot(b)) => assert!(!Arc::ptr_eq(&a, &b)),
            _ => panic!("expected one-shot runners"),
        }
    }
}
