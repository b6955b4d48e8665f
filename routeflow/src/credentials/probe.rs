//! Credential health probing.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::Credential;
use crate::context::ChatMessage;
use crate::errors::ReasoningError;
use crate::reasoning::{tasks, ReasoningUnitFactory, StreamRequest};

/// Why a credential is not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// Rejected by the service.
    Invalid,
    /// Out of quota.
    QuotaExceeded,
    /// The service is overloaded or did not answer in time.
    Overloaded,
    /// The service answered with nothing.
    EmptyResponse,
    /// No key configured.
    Missing,
    /// Anything else.
    Unknown,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Invalid => "invalid",
            Self::QuotaExceeded => "quota-exceeded",
            Self::Overloaded => "overloaded",
            Self::EmptyResponse => "empty-response",
            Self::Missing => "missing",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Result of probing one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Whether the credential is usable.
    pub works: bool,
    /// Why not, when it is not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
}

impl ProbeOutcome {
    /// A usable credential.
    #[must_use]
    pub fn working() -> Self {
        Self {
            works: true,
            reason: None,
        }
    }

    /// An unusable credential.
    #[must_use]
    pub fn failed(reason: FailureReason) -> Self {
        Self {
            works: false,
            reason: Some(reason),
        }
    }
}

/// Reports whether a candidate credential is currently usable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialProbe: Send + Sync {
    /// Probes one credential.
    ///
    /// An `Err` is treated the same as a failed outcome with the error's reason.
    async fn probe(&self, credential: &Credential) -> Result<ProbeOutcome, ReasoningError>;
}

/// Probes by streaming a short greeting through a reasoning unit.
///
/// A non-empty reply means the credential works.
pub struct StreamingHealthProbe {
    factory: Arc<dyn ReasoningUnitFactory>,
    greeting: String,
}

impl StreamingHealthProbe {
    /// Creates a probe that greets with "Hello".
    #[must_use]
    pub fn new(factory: Arc<dyn ReasoningUnitFactory>) -> Self {
        Self {
            factory,
            greeting: "Hello".to_string(),
        }
    }

    /// Overrides the greeting.
    #[must_use]
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }
}

impl fmt::Debug for StreamingHealthProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingHealthProbe")
            .field("greeting", &self.greeting)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialProbe for StreamingHealthProbe {
    async fn probe(&self, credential: &Credential) -> Result<ProbeOutcome, ReasoningError> {
        let unit = self.factory.create(credential, None);
        let request = StreamRequest::new(
            tasks::HEALTH,
            "",
            vec![ChatMessage::user(self.greeting.clone())],
        );

        let mut stream = unit.stream(&request).await?;
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            text.push_str(&chunk?);
        }

        if text.trim().is_empty() {
            Ok(ProbeOutcome::failed(FailureReason::EmptyResponse))
        } else {
            Ok(ProbeOutcome::working())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockUnitFactory;

    #[test]
    fn test_failure_reason_wire_names() {
        let json = serde_json::to_string(&FailureReason::QuotaExceeded).unwrap();
        assert_eq!(json, r#""quota-exceeded""#);
        assert_eq!(FailureReason::EmptyResponse.to_string(), "empty-response");
    }

    #[test]
    fn test_outcome_constructors() {
        assert!(ProbeOutcome::working().works);
        let failed = ProbeOutcome::failed(FailureReason::Invalid);
        assert!(!failed.works);
        assert_eq!(failed.reason, Some(FailureReason::Invalid));
    }

    #[tokio::test]
    async fn test_streaming_probe_reports_working() {
        let factory = MockUnitFactory::new().with_stream(tasks::HEALTH, vec!["Hi", " there"]);
        let probe = StreamingHealthProbe::new(Arc::new(factory));

        let outcome = probe.probe(&Credential::new("K1", "secret")).await.unwrap();
        assert!(outcome.works);
    }

    #[tokio::test]
    async fn test_streaming_probe_empty_reply() {
        let factory = MockUnitFactory::new().with_stream(tasks::HEALTH, Vec::<&str>::new());
        let probe = StreamingHealthProbe::new(Arc::new(factory));

        let outcome = probe.probe(&Credential::new("K1", "secret")).await.unwrap();
        assert_eq!(outcome.reason, Some(FailureReason::EmptyResponse));
    }

    #[tokio::test]
    async fn test_streaming_probe_propagates_rejection() {
        let factory = MockUnitFactory::new().with_failing_credential(
            "K1",
            ReasoningError::Unauthorized("bad key".into()),
        );
        let probe = StreamingHealthProbe::new(Arc::new(factory));

        let err = probe.probe(&Credential::new("K1", "secret")).await.unwrap_err();
        assert_eq!(err.failure_reason(), FailureReason::Invalid);
    }
}
