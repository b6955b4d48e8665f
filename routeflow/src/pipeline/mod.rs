//! Pipeline configuration and execution.
//!
//! This module provides:
//! - Pipeline configuration
//! - Credential-rotation retry policy
//! - Stage execution with failure isolation
//! - The per-request scheduler

mod config;
mod executor;
mod failure_tolerance;
mod retry;
mod scheduler;

#[cfg(test)]
mod integration_tests;

pub use config::PipelineConfig;
pub use executor::{AttemptRecord, StageExecutor};
pub use failure_tolerance::{ErrorPolicy, StageFailureRecord};
pub use retry::{BackoffStrategy, JitterStrategy, RetryPolicy};
pub use scheduler::{Pipeline, PipelineBuilder, RunOutcome};
