//! The built-in stages of the map assistant.

use async_trait::async_trait;

use super::{prompts, StageContext, StreamingStage, StructuredStage};
use crate::contracts::{
    ActionReport, Contract, ContextIntent, ReasoningDecision, SelectionDecision,
};
use crate::core::StageOutput;
use crate::errors::RouteflowError;
use crate::reasoning::{tasks, Prompt, ReasoningUnit, StreamRequest, TokenStream};
use crate::subpipeline::TwoPhaseExtractor;

fn structured_prompt<C: Contract>(task: &str, system: &str, text: String) -> Prompt {
    Prompt::new(task, system, text).with_schema(C::NAME)
}

/// Chooses which stages run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionStage;

impl SelectionStage {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StructuredStage for SelectionStage {
    async fn run(
        &self,
        unit: &dyn ReasoningUnit,
        ctx: &StageContext,
    ) -> Result<StageOutput, RouteflowError> {
        let request = ctx.request();
        let text = format!(
            "User Request: {}\nFull Conversation History:\n{}\n\n\
             Based on the user's intent, respond with:\n\
             1. agentsToUse: which agents should handle this request\n\
             2. reasoning: a short explanation of the selection",
            request.latest_query(),
            request.formatted_history(),
        );
        let prompt = structured_prompt::<SelectionDecision>(tasks::ORCHESTRATOR, prompts::ORCHESTRATOR, text);
        let value = unit.generate(&prompt).await?;
        Ok(StageOutput::Selection(SelectionDecision::coerce(value)?))
    }
}

/// Extracts the user's intent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextStage;

impl ContextStage {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StructuredStage for ContextStage {
    async fn run(
        &self,
        unit: &dyn ReasoningUnit,
        ctx: &StageContext,
    ) -> Result<StageOutput, RouteflowError> {
        let request = ctx.request();
        let text = format!(
            "User request: {}\nFull Conversation History:\n{}\nLocation: {}\n\n\
             Parse the user's message into a structured intent object. \
             Identify their goal, extract parameters, and list any required data.",
            request.latest_query(),
            request.formatted_history(),
            request.location_text(),
        );
        let prompt = structured_prompt::<ContextIntent>(tasks::CONTEXT, prompts::CONTEXT, text);
        let value = unit.generate(&prompt).await?;
        Ok(StageOutput::Context(ContextIntent::coerce(value)?))
    }
}

/// Gathers data through the two-phase extractor.
#[derive(Debug, Clone, Default)]
pub struct DataStage {
    extractor: TwoPhaseExtractor,
}

impl DataStage {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            extractor: TwoPhaseExtractor::new(),
        }
    }
}

#[async_trait]
impl StructuredStage for DataStage {
    async fn run(
        &self,
        unit: &dyn ReasoningUnit,
        ctx: &StageContext,
    ) -> Result<StageOutput, RouteflowError> {
        let text = format!(
            "Context object: {}\nLocation: {}\n\n\
             Extract all the relevant data for the intent above.",
            ctx.state_json()?,
            ctx.request().location_text(),
        );
        let report = self.extractor.extract(unit, &text).await?;
        Ok(StageOutput::Data(report))
    }
}

/// Picks the best options from the gathered data.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReasoningStage;

impl ReasoningStage {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StructuredStage for ReasoningStage {
    async fn run(
        &self,
        unit: &dyn ReasoningUnit,
        ctx: &StageContext,
    ) -> Result<StageOutput, RouteflowError> {
        let text = format!(
            "Context object: {}\n\n\
             Decide which options best serve the user's intent and why.",
            ctx.state_json()?,
        );
        let prompt = structured_prompt::<ReasoningDecision>(tasks::REASONING, prompts::REASONING, text);
        let value = unit.generate(&prompt).await?;
        Ok(StageOutput::Reasoning(ReasoningDecision::coerce(value)?))
    }
}

/// Turns the decision into map commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionStage;

impl ActionStage {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StructuredStage for ActionStage {
    async fn run(
        &self,
        unit: &dyn ReasoningUnit,
        ctx: &StageContext,
    ) -> Result<StageOutput, RouteflowError> {
        let text = format!(
            "Context object: {}\nLocation: {}\n\n\
             Produce the markers, routes and map view that show the decision.",
            ctx.state_json()?,
            ctx.request().location_text(),
        );
        let prompt = structured_prompt::<ActionReport>(tasks::ACTION, prompts::ACTION, text);
        let value = unit.generate(&prompt).await?;
        Ok(StageOutput::Action(ActionReport::coerce(value)?))
    }
}

/// Which interaction stage this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    /// Announce the plan.
    Plan,
    /// Summarize the outcome.
    Summary,
}

/// Talks to the user over a token stream.
#[derive(Debug, Clone, Copy)]
pub struct InteractionStage {
    mode: InteractionMode,
}

impl InteractionStage {
    /// Creates the plan announcement stage.
    #[must_use]
    pub fn plan() -> Self {
        Self {
            mode: InteractionMode::Plan,
        }
    }

    /// Creates the summary stage.
    #[must_use]
    pub fn summary() -> Self {
        Self {
            mode: InteractionMode::Summary,
        }
    }

    /// The mode.
    #[must_use]
    pub fn mode(&self) -> InteractionMode {
        self.mode
    }
}

#[async_trait]
impl StreamingStage for InteractionStage {
    async fn open(
        &self,
        unit: &dyn ReasoningUnit,
        ctx: &StageContext,
    ) -> Result<TokenStream, RouteflowError> {
        let (task, instructions) = match self.mode {
            InteractionMode::Plan => (tasks::PLAN, prompts::PLAN),
            InteractionMode::Summary => (tasks::SUMMARY, prompts::SUMMARY),
        };
        let system = format!(
            "{instructions}\n\nCurrent Agent State:\n{}\n\nCurrent Location: {}",
            ctx.state_json()?,
            ctx.request().location_text(),
        );
        let request = StreamRequest::new(task, system, ctx.request().conversation_history.clone());
        Ok(unit.stream(&request).await?)
    }
}
