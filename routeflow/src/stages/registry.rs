//! The validated, ordered set of stage descriptors.

use super::{
    ActionStage, Activation, ContextStage, DataStage, InputSource, InteractionStage,
    ReasoningStage, SelectionStage, StageDescriptor,
};
use crate::contracts::AgentKind;
use crate::core::{StageMode, StageName};
use crate::errors::RouteflowError;

/// An immutable, validated stage list.
///
/// Invariants: the first stage is the one-shot, always-active selection
/// stage; the last is the streaming, always-active summary stage; names are
/// unique and appear in pipeline order (strictly increasing).
#[derive(Debug, Clone)]
pub struct StageRegistry {
    descriptors: Vec<StageDescriptor>,
}

impl StageRegistry {
    /// Validates and wraps `descriptors`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteflowError::InvalidRegistry`] if an invariant does not hold.
    pub fn new(descriptors: Vec<StageDescriptor>) -> Result<Self, RouteflowError> {
        let invalid = |msg: String| Err(RouteflowError::InvalidRegistry(msg));

        let (Some(first), Some(last)) = (descriptors.first(), descriptors.last()) else {
            return invalid("registry is empty".to_string());
        };
        if first.name() != StageName::Orchestrator || first.mode() != StageMode::OneShot {
            return invalid(format!("first stage must be a one-shot Orchestrator, got {}", first.name()));
        }
        if last.name() != StageName::Summary || last.mode() != StageMode::Streaming {
            return invalid(format!("last stage must be a streaming Summary, got {}", last.name()));
        }
        if !matches!(first.activation(), Activation::Always) || !matches!(last.activation(), Activation::Always) {
            return invalid("selection and summary stages must always be active".to_string());
        }

        for pair in descriptors.windows(2) {
            if pair[0].name() >= pair[1].name() {
                return invalid(format!(
                    "stage {} may not follow {}",
                    pair[1].name(),
                    pair[0].name()
                ));
            }
        }

        Ok(Self { descriptors })
    }

    /// The map assistant's stage list.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            descriptors: standard_descriptors(),
        }
    }

    /// Returns a registry with one descriptor replaced by name.
    ///
    /// # Errors
    ///
    /// Returns [`RouteflowError::InvalidRegistry`] if the name is not present
    /// or the result violates an invariant.
    pub fn with_stage(&self, descriptor: StageDescriptor) -> Result<Self, RouteflowError> {
        let mut descriptors = self.descriptors.clone();
        let Some(slot) = descriptors.iter_mut().find(|d| d.name() == descriptor.name()) else {
            return Err(RouteflowError::InvalidRegistry(format!(
                "no stage named {}",
                descriptor.name()
            )));
        };
        *slot = descriptor;
        Self::new(descriptors)
    }

    /// Descriptors in pipeline order.
    #[must_use]
    pub fn descriptors(&self) -> &[StageDescriptor] {
        &self.descriptors
    }

    /// Looks a descriptor up by name.
    #[must_use]
    pub fn get(&self, name: StageName) -> Option<&StageDescriptor> {
        self.descriptors.iter().find(|d| d.name() == name)
    }

    /// The selection stage.
    #[must_use]
    pub fn selection(&self) -> &StageDescriptor {
        &self.descriptors[0]
    }

    /// The summary stage.
    #[must_use]
    pub fn summary(&self) -> &StageDescriptor {
        &self.descriptors[self.descriptors.len() - 1]
    }

    /// Every stage between selection and summary.
    #[must_use]
    pub fn middle(&self) -> &[StageDescriptor] {
        &self.descriptors[1..self.descriptors.len() - 1]
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_descriptors() -> Vec<StageDescriptor> {
    vec![
        StageDescriptor::one_shot(StageName::Orchestrator, Activation::Always, SelectionStage::new)
            .with_input(InputSource::Query),
        StageDescriptor::streaming(StageName::Plan, Activation::WhenAnySelected, InteractionStage::plan),
        StageDescriptor::one_shot(
            StageName::Context,
            Activation::WhenSelected(AgentKind::ContextAgent),
            ContextStage::new,
        )
        .with_input(InputSource::Slot(StageName::Orchestrator)),
        StageDescriptor::one_shot(
            StageName::Data,
            Activation::WhenSelected(AgentKind::DataAgent),
            DataStage::new,
        )
        .with_input(InputSource::Slot(StageName::Context)),
        StageDescriptor::one_shot(
            StageName::Reasoning,
            Activation::WhenSelected(AgentKind::ReasoningAgent),
            ReasoningStage::new,
        )
        .with_input(InputSource::Slot(StageName::Context)),
        StageDescriptor::one_shot(
            StageName::Action,
            Activation::WhenSelected(AgentKind::ActionAgent),
            ActionStage::new,
        )
        .with_input(InputSource::Slot(StageName::Context)),
        StageDescriptor::streaming(StageName::Summary, Activation::Always, InteractionStage::summary),
    ]
}
