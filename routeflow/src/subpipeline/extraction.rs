//! Two-phase structured extraction used by the data stage.
//!
//! Phase one asks the unit to gather data freely and reduces whatever comes
//! back to a textual digest. Phase two coerces the digest alone into a
//! [`DataReport`]; it never gathers again. Both phases run on the same unit,
//! so a retry of the data stage repeats the whole body on the next credential.

use std::time::Instant;
use tracing::debug;

use crate::contracts::{Contract, DataReport};
use crate::errors::RouteflowError;
use crate::reasoning::{tasks, Prompt, ReasoningUnit};
use crate::stages::prompts;
use crate::utils::elapsed_ms;

/// Digest used when phase one produced nothing.
pub const NO_DATA: &str = "No data available";

/// Reduces a free-form result to text.
///
/// Strings are kept verbatim, objects carrying a `content` field are reduced
/// to that field, and anything else is serialized.
#[must_use]
pub fn digest_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => NO_DATA.to_string(),
        serde_json::Value::String(text) if text.trim().is_empty() => NO_DATA.to_string(),
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Object(map) if map.contains_key("content") => {
            map.get("content").map_or_else(|| NO_DATA.to_string(), digest_text)
        }
        serde_json::Value::Array(items) if items.is_empty() => NO_DATA.to_string(),
        other => other.to_string(),
    }
}

/// The extract-then-coerce body of the data stage.
#[derive(Debug, Clone)]
pub struct TwoPhaseExtractor {
    extract_system: String,
    coerce_system: String,
}

impl Default for TwoPhaseExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TwoPhaseExtractor {
    /// Creates an extractor with the built-in instructions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            extract_system: prompts::DATA_EXTRACT.to_string(),
            coerce_system: prompts::DATA_COERCE.to_string(),
        }
    }

    /// Runs both phases.
    ///
    /// # Errors
    ///
    /// Propagates unit failures from either phase, and returns
    /// [`RouteflowError::SchemaCoercion`] if the digest does not fit a report.
    pub async fn extract(
        &self,
        unit: &dyn ReasoningUnit,
        request_text: &str,
    ) -> Result<DataReport, RouteflowError> {
        let started = Instant::now();
        let raw = unit
            .generate(&Prompt::new(
                tasks::DATA_EXTRACT,
                self.extract_system.clone(),
                request_text,
            ))
            .await?;
        let digest = digest_text(&raw);
        debug!(
            digest_len = digest.len(),
            duration_ms = elapsed_ms(started),
            "Data digest ready"
        );

        let coerced = unit
            .generate(
                &Prompt::new(
                    tasks::DATA_COERCE,
                    self.coerce_system.clone(),
                    format!("Parse the following raw data summary into the report schema.\n\nRaw Data:\n{digest}"),
                )
                .with_schema(DataReport::NAME),
            )
            .await?;

        Ok(DataReport::coerce(coerced)?)
    }
}
