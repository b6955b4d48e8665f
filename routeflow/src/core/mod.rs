//! Core domain model types for routeflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Stage names, modes and pipeline phases
//! - Typed stage outputs
//! - Pipeline events delivered to the caller

mod event;
mod output;
mod status;

pub use event::PipelineEvent;
pub use output::StageOutput;
pub use status::{PipelinePhase, StageMode, StageName};
