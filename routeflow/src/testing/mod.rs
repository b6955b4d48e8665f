//! Testing utilities for routeflow pipelines.
//!
//! This module provides:
//! - Scripted reasoning units and credential probes
//! - Canned requests and stage outputs
//! - Assertions over event sequences

mod assertions;
pub mod fixtures;
mod mocks;

pub use assertions::{
    assert_event_order, assert_single_fatal, error_for, event_labels, streamed_text,
};
pub use mocks::{MockBackend, MockReasoningUnit, MockUnitFactory, RecordedCall, StaticProbe};
