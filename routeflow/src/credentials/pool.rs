//! Concurrent probing and the working credential pool.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{Credential, CredentialProbe, FailureReason, ProbeOutcome};
use crate::errors::PoolExhaustedError;
use crate::utils::elapsed_ms;

/// The probe result for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStatus {
    /// Candidate label.
    pub label: String,
    /// Short fingerprint of the secret.
    pub fingerprint: String,
    /// Whether it is usable.
    pub works: bool,
    /// Why not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
}

/// Outcome of probing a candidate set.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    working: Vec<Credential>,
    statuses: Vec<CredentialStatus>,
}

impl ProbeReport {
    /// Returns the working subset in candidate order.
    #[must_use]
    pub fn working(&self) -> &[Credential] {
        &self.working
    }

    /// Returns the status of every candidate, in candidate order.
    #[must_use]
    pub fn statuses(&self) -> &[CredentialStatus] {
        &self.statuses
    }

    /// Returns the status for a label.
    #[must_use]
    pub fn status(&self, label: &str) -> Option<&CredentialStatus> {
        self.statuses.iter().find(|s| s.label == label)
    }

    /// Converts the report into a pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolExhaustedError`] if no candidate works.
    pub fn into_pool(self) -> Result<CredentialPool, PoolExhaustedError> {
        if self.working.is_empty() {
            let err = self
                .statuses
                .iter()
                .fold(PoolExhaustedError::new(self.statuses.len()), |err, s| {
                    err.with_reason(s.label.clone(), s.reason.unwrap_or(FailureReason::Unknown))
                });
            return Err(err);
        }
        Ok(CredentialPool::new(self.working))
    }
}

/// The read-only working set for one request.
///
/// Cheap to clone; stages never mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPool {
    credentials: Arc<[Credential]>,
}

impl CredentialPool {
    /// Creates a pool from already-probed credentials.
    #[must_use]
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self {
            credentials: credentials.into(),
        }
    }

    /// Returns the number of working credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Returns true if the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Returns the credential at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Credential> {
        self.credentials.get(index)
    }

    /// Returns the first credential.
    #[must_use]
    pub fn first(&self) -> Option<&Credential> {
        self.credentials.first()
    }

    /// Iterates in pool order.
    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.credentials.iter()
    }
}

/// Probes candidates and builds the working pool.
#[derive(Clone)]
pub struct CredentialPoolManager {
    probe: Arc<dyn CredentialProbe>,
    probe_timeout: Duration,
}

impl CredentialPoolManager {
    /// Creates a manager with a 15 second probe timeout.
    #[must_use]
    pub fn new(probe: Arc<dyn CredentialProbe>) -> Self {
        Self {
            probe,
            probe_timeout: Duration::from_secs(15),
        }
    }

    /// Sets the per-probe timeout.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Probes every candidate concurrently.
    ///
    /// Blank candidates are reported as missing without calling the probe.
    /// A probe that errors or exceeds the timeout marks only its own candidate
    /// as failed.
    pub async fn probe(&self, candidates: &[Credential]) -> ProbeReport {
        let started = Instant::now();
        let outcomes = join_all(candidates.iter().map(|c| self.probe_one(c))).await;

        let mut working = Vec::new();
        let mut statuses = Vec::with_capacity(candidates.len());
        for (credential, outcome) in candidates.iter().zip(outcomes) {
            if outcome.works {
                working.push(credential.clone());
            }
            statuses.push(CredentialStatus {
                label: credential.label().to_string(),
                fingerprint: credential.fingerprint(),
                works: outcome.works,
                reason: outcome.reason,
            });
        }

        info!(
            candidates = candidates.len(),
            working = working.len(),
            duration_ms = elapsed_ms(started),
            "Credential probe finished"
        );

        ProbeReport { working, statuses }
    }

    /// Probes the candidates and returns the working pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolExhaustedError`] if no candidate works.
    pub async fn working_pool(
        &self,
        candidates: &[Credential],
    ) -> Result<CredentialPool, PoolExhaustedError> {
        self.probe(candidates).await.into_pool()
    }

    async fn probe_one(&self, credential: &Credential) -> ProbeOutcome {
        if credential.is_blank() {
            warn!(credential = %credential.label(), "KEY NOT AVAILABLE");
            return ProbeOutcome::failed(FailureReason::Missing);
        }

        let outcome = match tokio::time::timeout(self.probe_timeout, self.probe.probe(credential)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => ProbeOutcome::failed(err.failure_reason()),
            Err(_) => ProbeOutcome::failed(FailureReason::Overloaded),
        };

        if outcome.works {
            debug!(credential = %credential.masked(), "Credential works");
        } else {
            warn!(
                credential = %credential.masked(),
                reason = %outcome.reason.unwrap_or(FailureReason::Unknown),
                "Credential failed probe"
            );
        }
        outcome
    }
}

impl std::fmt::Debug for CredentialPoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPoolManager")
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MockCredentialProbe;
    use crate::errors::ReasoningError;

    fn candidates() -> Vec<Credential> {
        vec![
            Credential::new("KEY_1", "aaaa1111"),
            Credential::new("KEY_2", "bbbb2222"),
            Credential::new("KEY_3", ""),
            Credential::new("KEY_4", "dddd4444"),
        ]
    }

    fn mock_probe() -> MockCredentialProbe {
        let mut probe = MockCredentialProbe::new();
        probe.expect_probe().returning(|c| match c.label() {
            "KEY_2" => Err(ReasoningError::RateLimited("429".into())),
            _ => Ok(ProbeOutcome::working()),
        });
        probe
    }

    #[tokio::test]
    async fn test_probe_filters_and_preserves_order() {
        let manager = CredentialPoolManager::new(Arc::new(mock_probe()));
        let report = manager.probe(&candidates()).await;

        let labels: Vec<_> = report.working().iter().map(Credential::label).collect();
        assert_eq!(labels, vec!["KEY_1", "KEY_4"]);
        assert_eq!(
            report.status("KEY_2").and_then(|s| s.reason),
            Some(FailureReason::QuotaExceeded)
        );
        assert_eq!(
            report.status("KEY_3").and_then(|s| s.reason),
            Some(FailureReason::Missing)
        );
    }

    #[tokio::test]
    async fn test_blank_candidate_is_not_probed() {
        let mut probe = MockCredentialProbe::new();
        probe.expect_probe().times(0);
        let manager = CredentialPoolManager::new(Arc::new(probe));

        let report = manager.probe(&[Credential::new("KEY_1", "  ")]).await;
        assert!(report.working().is_empty());
    }

    #[tokio::test]
    async fn test_probe_is_idempotent() {
        let manager = CredentialPoolManager::new(Arc::new(mock_probe()));
        let first = manager.probe(&candidates()).await;
        let second = manager.probe(&candidates()).await;

        assert_eq!(first.working(), second.working());
        assert_eq!(first.statuses(), second.statuses());
    }

    #[tokio::test]
    async fn test_all_failing_is_exhausted() {
        let mut probe = MockCredentialProbe::new();
        probe
            .expect_probe()
            .returning(|_| Ok(ProbeOutcome::failed(FailureReason::Invalid)));
        let manager = CredentialPoolManager::new(Arc::new(probe));

        let err = manager.working_pool(&candidates()).await.unwrap_err();
        assert_eq!(err.candidates, 4);
        assert_eq!(err.reasons.get("KEY_3"), Some(&FailureReason::Missing));
        assert_eq!(err.reasons.get("KEY_1"), Some(&FailureReason::Invalid));
    }

    #[tokio::test]
    async fn test_slow_probe_counts_as_overloaded() {
        let probe = crate::testing::StaticProbe::all_working()
            .with_delay(Duration::from_millis(200));
        let manager = CredentialPoolManager::new(Arc::new(probe))
            .with_probe_timeout(Duration::from_millis(20));

        let report = manager.probe(&[Credential::new("KEY_1", "slow")]).await;
        assert_eq!(report.statuses()[0].reason, Some(FailureReason::Overloaded));
    }

    #[test]
    fn test_pool_accessors() {
        let pool = CredentialPool::new(vec![Credential::new("A", "1"), Credential::new("B", "2")]);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.first().map(Credential::label), Some("A"));
        assert_eq!(pool.get(1).map(Credential::label), Some("B"));
        assert!(pool.get(2).is_none());
    }
}
