//! Pipeline configuration.
//!
//! Loadable from JSON or from `ROUTEFLOW_*` environment variables; every
//! field has a default.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ErrorPolicy, RetryPolicy};
use crate::errors::RouteflowError;

/// Converts validated seconds; values too large for a `Duration` saturate.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

fn default_attempt_timeout_seconds() -> f64 {
    60.0
}

fn default_stream_timeout_seconds() -> f64 {
    120.0
}

fn default_probe_timeout_seconds() -> f64 {
    15.0
}

fn default_channel_capacity() -> usize {
    256
}

fn default_credential_prefix() -> String {
    "GOOGLE_GENERATIVE_AI_API_KEY".to_string()
}

fn default_credential_count() -> usize {
    4
}

/// Tunables for one [`Pipeline`](super::Pipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Retry ceiling and backoff.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Budget for one one-shot attempt.
    #[serde(default = "default_attempt_timeout_seconds")]
    pub attempt_timeout_seconds: f64,
    /// Budget for a whole streaming stage.
    #[serde(default = "default_stream_timeout_seconds")]
    pub stream_timeout_seconds: f64,
    /// Budget for one credential probe.
    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: f64,
    /// How failures are kept in the shared state.
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    /// Capacity of the event channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Environment prefix of numbered credential variables.
    #[serde(default = "default_credential_prefix")]
    pub credential_prefix: String,
    /// How many numbered credential variables to read.
    #[serde(default = "default_credential_count")]
    pub credential_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            attempt_timeout_seconds: default_attempt_timeout_seconds(),
            stream_timeout_seconds: default_stream_timeout_seconds(),
            probe_timeout_seconds: default_probe_timeout_seconds(),
            error_policy: ErrorPolicy::default(),
            channel_capacity: default_channel_capacity(),
            credential_prefix: default_credential_prefix(),
            credential_count: default_credential_count(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, RouteflowError> {
    raw.trim()
        .parse()
        .map_err(|_| RouteflowError::Config(format!("invalid value for {name}: '{raw}'")))
}

impl PipelineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`RouteflowError::Config`] on malformed JSON or invalid values.
    pub fn from_json_str(json: &str) -> Result<Self, RouteflowError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RouteflowError::Config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`RouteflowError::Config`] if a variable does not parse.
    pub fn from_env() -> Result<Self, RouteflowError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads overrides through an arbitrary lookup.
    ///
    /// Recognized variables: `ROUTEFLOW_RETRY_CEILING`, `ROUTEFLOW_RETRY_BASE_DELAY_MS`,
    /// `ROUTEFLOW_ATTEMPT_TIMEOUT_SECONDS`, `ROUTEFLOW_STREAM_TIMEOUT_SECONDS`,
    /// `ROUTEFLOW_PROBE_TIMEOUT_SECONDS`, `ROUTEFLOW_ERROR_POLICY`,
    /// `ROUTEFLOW_CHANNEL_CAPACITY`, `ROUTEFLOW_CREDENTIAL_PREFIX` and
    /// `ROUTEFLOW_CREDENTIAL_COUNT`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteflowError::Config`] if a variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RouteflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |suffix: &str| {
            let name = format!("ROUTEFLOW_{suffix}");
            lookup(&name).map(|value| (name, value))
        };

        if let Some((name, v)) = get("RETRY_CEILING") {
            config.retry.retry_ceiling = parse_var(&name, &v)?;
        }
        if let Some((name, v)) = get("RETRY_BASE_DELAY_MS") {
            config.retry.base_delay_ms = parse_var(&name, &v)?;
        }
        if let Some((name, v)) = get("ATTEMPT_TIMEOUT_SECONDS") {
            config.attempt_timeout_seconds = parse_var(&name, &v)?;
        }
        if let Some((name, v)) = get("STREAM_TIMEOUT_SECONDS") {
            config.stream_timeout_seconds = parse_var(&name, &v)?;
        }
        if let Some((name, v)) = get("PROBE_TIMEOUT_SECONDS") {
            config.probe_timeout_seconds = parse_var(&name, &v)?;
        }
        if let Some((name, v)) = get("ERROR_POLICY") {
            config.error_policy = match v.trim() {
                "accumulate" => ErrorPolicy::Accumulate,
                "last_write_wins" => ErrorPolicy::LastWriteWins,
                _ => return Err(RouteflowError::Config(format!("invalid value for {name}: '{v}'"))),
            };
        }
        if let Some((name, v)) = get("CHANNEL_CAPACITY") {
            config.channel_capacity = parse_var(&name, &v)?;
        }
        if let Some((_, v)) = get("CREDENTIAL_PREFIX") {
            config.credential_prefix = v;
        }
        if let Some((name, v)) = get("CREDENTIAL_COUNT") {
            config.credential_count = parse_var(&name, &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`RouteflowError::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<(), RouteflowError> {
        if self.retry.retry_ceiling == 0 {
            return Err(RouteflowError::Config("retry_ceiling must be at least 1".to_string()));
        }
        for (name, value) in [
            ("attempt_timeout_seconds", self.attempt_timeout_seconds),
            ("stream_timeout_seconds", self.stream_timeout_seconds),
            ("probe_timeout_seconds", self.probe_timeout_seconds),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(RouteflowError::Config(format!("{name} must be positive")));
            }
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(RouteflowError::Config(format!("{name} is out of range")));
            }
        }
        if self.channel_capacity == 0 {
            return Err(RouteflowError::Config("channel_capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the retry ceiling.
    #[must_use]
    pub fn with_retry_ceiling(mut self, ceiling: usize) -> Self {
        self.retry.retry_ceiling = ceiling;
        self
    }

    /// Sets the one-shot attempt timeout.
    #[must_use]
    pub fn with_attempt_timeout_seconds(mut self, seconds: f64) -> Self {
        self.attempt_timeout_seconds = seconds;
        self
    }

    /// Sets the streaming stage timeout.
    #[must_use]
    pub fn with_stream_timeout_seconds(mut self, seconds: f64) -> Self {
        self.stream_timeout_seconds = seconds;
        self
    }

    /// Sets the probe timeout.
    #[must_use]
    pub fn with_probe_timeout_seconds(mut self, seconds: f64) -> Self {
        self.probe_timeout_seconds = seconds;
        self
    }

    /// Sets the error policy.
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Sets the channel capacity.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// The one-shot attempt timeout.
    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        seconds(self.attempt_timeout_seconds)
    }

    /// The streaming stage timeout.
    #[must_use]
    pub fn stream_timeout(&self) -> Duration {
        seconds(self.stream_timeout_seconds)
    }

    /// The probe timeout.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        seconds(self.probe_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.retry.retry_ceiling, 3);
        assert_eq!(config.attempt_timeout(), Duration::from_secs(60));
        assert_eq!(config.stream_timeout(), Duration::from_secs(120));
        assert_eq!(config.probe_timeout(), Duration::from_secs(15));
        assert_eq!(config.error_policy, ErrorPolicy::Accumulate);
        assert_eq!(config.credential_count, 4);
    }

    #[test]
    fn test_from_json_partial() {
        let config = PipelineConfig::from_json_str(
            r#"{"retry": {"retry_ceiling": 2}, "error_policy": "last_write_wins"}"#,
        )
        .unwrap();

        assert_eq!(config.retry.retry_ceiling, 2);
        assert_eq!(config.error_policy, ErrorPolicy::LastWriteWins);
        assert_eq!(config.channel_capacity, 256);
    }

    #[test]
    fn test_from_json_rejects_zero_ceiling() {
        let err = PipelineConfig::from_json_str(r#"{"retry": {"retry_ceiling": 0}}"#).unwrap_err();
        assert!(matches!(err, RouteflowError::Config(_)));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("ROUTEFLOW_RETRY_CEILING", "5"),
            ("ROUTEFLOW_ATTEMPT_TIMEOUT_SECONDS", "2.5"),
            ("ROUTEFLOW_ERROR_POLICY", "last_write_wins"),
            ("ROUTEFLOW_CREDENTIAL_PREFIX", "MAPS_KEY"),
        ]
        .into();
        let config =
            PipelineConfig::from_lookup(|name| vars.get(name).map(|v| (*v).to_string())).unwrap();

        assert_eq!(config.retry.retry_ceiling, 5);
        assert_eq!(config.attempt_timeout(), Duration::from_millis(2500));
        assert_eq!(config.error_policy, ErrorPolicy::LastWriteWins);
        assert_eq!(config.credential_prefix, "MAPS_KEY");
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = PipelineConfig::from_lookup(|name| {
            (name == "ROUTEFLOW_CHANNEL_CAPACITY").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("ROUTEFLOW_CHANNEL_CAPACITY"));
    }

    #[test]
    fn test_builders() {
        let config = PipelineConfig::new()
            .with_retry_ceiling(1)
            .with_stream_timeout_seconds(5.0)
            .with_channel_capacity(8);
        assert_eq!(config.retry.attempts_for(4), 1);
        assert_eq!(config.stream_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_timeout_too_large_for_duration() {
        let err = PipelineConfig::from_json_str(r#"{"attempt_timeout_seconds": 1e20}"#).unwrap_err();
        assert!(err.to_string().contains("attempt_timeout_seconds"));

        let err = PipelineConfig::from_lookup(|name| {
            (name == "ROUTEFLOW_PROBE_TIMEOUT_SECONDS").then(|| "1e20".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, RouteflowError::Config(_)));
    }

    #[test]
    fn test_unvalidated_huge_timeout_saturates() {
        let config = PipelineConfig::new().with_stream_timeout_seconds(1e20);
        assert!(config.validate().is_err());
        assert_eq!(config.stream_timeout(), Duration::MAX);
    }
}
