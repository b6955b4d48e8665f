//! Boundary validation for reasoning-unit output.
//!
//! Reasoning units return loosely typed JSON; every stage coerces that JSON
//! into its contract type here before anything reaches the shared state.

use serde::{de::DeserializeOwned, Serialize};

use crate::errors::SchemaCoercionError;

/// A typed stage contract.
pub trait Contract: Serialize + DeserializeOwned {
    /// Stable contract name, also used as the schema hint sent to reasoning units.
    const NAME: &'static str;

    /// Coerces a raw reasoning-unit value into this contract.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaCoercionError`] if the value does not fit.
    fn coerce(value: serde_json::Value) -> Result<Self, SchemaCoercionError> {
        coerce_value(Self::NAME, value)
    }
}

/// Coerces a raw value into `T`.
///
/// Strings are treated as serialized JSON (optionally wrapped in a markdown
/// code fence) and parsed before validation.
///
/// # Errors
///
/// Returns a [`SchemaCoercionError`] naming `target` if parsing or
/// validation fails.
pub fn coerce_value<T: DeserializeOwned>(
    target: &str,
    value: serde_json::Value,
) -> Result<T, SchemaCoercionError> {
    let value = match value {
        serde_json::Value::String(text) => {
            let body = strip_code_fence(&text);
            if body.is_empty() {
                return Err(SchemaCoercionError::new(target, "empty output"));
            }
            serde_json::from_str(body)
                .map_err(|e| SchemaCoercionError::new(target, format!("not valid JSON: {e}")))?
        }
        serde_json::Value::Null => {
            return Err(SchemaCoercionError::new(target, "empty output"));
        }
        other => other,
    };

    serde_json::from_value(value).map_err(|e| SchemaCoercionError::new(target, e.to_string()))
}

/// Strips a surrounding markdown code fence such as ```` ```json ... ``` ````.
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
