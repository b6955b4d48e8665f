//! Sub-pipelines composed inside a single stage attempt.

mod extraction;

pub use extraction::{digest_text, TwoPhaseExtractor, NO_DATA};
