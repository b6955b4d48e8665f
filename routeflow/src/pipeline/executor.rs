//! Stage execution with credential rotation and failure isolation.
//!
//! One-shot stages are retried sequentially across distinct credentials of
//! the working pool. Streaming stages run exactly once on the first working
//! credential. Every invocation is bounded by a timeout. Turning an exhausted
//! stage into an error event is left to [`StageExecutor::isolate`], which the
//! scheduler calls for every stage except selection.

use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{PipelineConfig, RetryPolicy, StageFailureRecord};
use crate::context::SharedState;
use crate::core::{PipelineEvent, StageName, StageOutput};
use crate::credentials::{Credential, CredentialPool};
use crate::errors::{PoolExhaustedError, RouteflowError};
use crate::events::{names, EventSink, EventWriter};
use crate::reasoning::{ReasoningUnit, ReasoningUnitFactory};
use crate::stages::{StageContext, StreamingStage, StructuredStage};
use crate::utils::{duration_ms, elapsed_ms, redact_secrets};

/// One invocation of a stage body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    /// The stage.
    pub stage: StageName,
    /// 1-based attempt number.
    pub attempt: usize,
    /// Index of the credential in the working pool.
    pub credential_index: usize,
    /// Masked credential.
    pub credential: String,
    /// Sanitized error, `None` on success.
    pub error: Option<String>,
    /// Wall time of the attempt.
    pub duration_ms: u64,
}

impl AttemptRecord {
    /// Returns true if the attempt succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs stage bodies for one request.
pub struct StageExecutor {
    policy: RetryPolicy,
    attempt_timeout: Duration,
    stream_timeout: Duration,
    factory: Arc<dyn ReasoningUnitFactory>,
    sink: Arc<dyn EventSink>,
    pool: CredentialPool,
    attempts: Mutex<Vec<AttemptRecord>>,
}

impl StageExecutor {
    /// Creates an executor bound to a working pool.
    #[must_use]
    pub fn new(
        config: &PipelineConfig,
        factory: Arc<dyn ReasoningUnitFactory>,
        sink: Arc<dyn EventSink>,
        pool: CredentialPool,
    ) -> Self {
        Self {
            policy: config.retry.clone(),
            attempt_timeout: config.attempt_timeout(),
            stream_timeout: config.stream_timeout(),
            factory,
            sink,
            pool,
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// The working pool.
    #[must_use]
    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Every attempt made so far, in order.
    #[must_use]
    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.attempts.lock().clone()
    }

    /// Attempts made for one stage.
    #[must_use]
    pub fn attempts_for(&self, stage: StageName) -> usize {
        self.attempts.lock().iter().filter(|a| a.stage == stage).count()
    }

    /// Runs a one-shot stage with up to `min(|pool|, retry_ceiling)` attempts.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error once every attempt has failed.
    pub async fn run_one_shot(
        &self,
        name: StageName,
        stage: &dyn StructuredStage,
        ctx: &StageContext,
    ) -> Result<StageOutput, RouteflowError> {
        let max_attempts = self.policy.attempts_for(self.pool.len());
        let model_hint = ctx.request().model_hint.as_deref();
        let mut last_error = None;

        for (index, credential) in self.pool.iter().take(max_attempts).enumerate() {
            let attempt = index + 1;
            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                debug!(stage = %name, attempt, delay_ms = duration_ms(delay), "Backing off");
                tokio::time::sleep(delay).await;
            }

            info!(
                stage = %name,
                attempt,
                max_attempts,
                credential = %credential.masked(),
                "Attempt {attempt}/{max_attempts} using key {}",
                credential.masked()
            );

            let unit = self.factory.create(credential, model_hint);
            let started = Instant::now();
            let result = match tokio::time::timeout(self.attempt_timeout, stage.run(unit.as_ref(), ctx)).await {
                Ok(result) => result,
                Err(_) => Err(RouteflowError::timeout(name.as_str(), self.attempt_timeout.as_secs_f64())),
            };
            let duration_ms = elapsed_ms(started);

            match result {
                Ok(output) => {
                    self.log_attempt(name, attempt, index, credential, None, duration_ms);
                    return Ok(output);
                }
                Err(err) => {
                    let message = self.sanitize(&err.to_string());
                    warn!(
                        stage = %name,
                        attempt,
                        max_attempts,
                        credential = %credential.masked(),
                        error = %message,
                        "Attempt failed"
                    );
                    self.sink.emit(
                        names::STAGE_ATTEMPT_FAILED,
                        serde_json::json!({
                            "stage": name,
                            "attempt": attempt,
                            "max_attempts": max_attempts,
                            "credential": credential.masked(),
                            "error": message,
                            "error_type": err.kind(),
                        }),
                    );
                    self.log_attempt(name, attempt, index, credential, Some(message), duration_ms);
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PoolExhaustedError::new(self.pool.len()).into()))
    }

    /// Runs a streaming stage once, draining its tokens into `writer`.
    ///
    /// Returns the streamed text. The stream timeout bounds time spent
    /// waiting on the upstream only; a slow reader does not consume it.
    /// Empty chunks are dropped. If the caller goes away the stream is
    /// abandoned and the text so far is returned.
    ///
    /// # Errors
    ///
    /// Returns the error from opening or reading the stream, or a timeout.
    pub async fn run_streaming(
        &self,
        name: StageName,
        stage: &dyn StreamingStage,
        ctx: &StageContext,
        writer: &EventWriter,
    ) -> Result<String, RouteflowError> {
        let credential = self
            .pool
            .first()
            .ok_or_else(|| RouteflowError::from(PoolExhaustedError::new(0)))?;
        let unit = self.factory.create(credential, ctx.request().model_hint.as_deref());
        info!(stage = %name, credential = %credential.masked(), "Streaming stage");

        let started = Instant::now();
        let result = self.drain(name, stage, unit.as_ref(), ctx, writer).await;
        let duration_ms = elapsed_ms(started);

        let error = result.as_ref().err().map(|e| self.sanitize(&e.to_string()));
        self.log_attempt(name, 1, 0, credential, error, duration_ms);
        result
    }

    async fn drain(
        &self,
        name: StageName,
        stage: &dyn StreamingStage,
        unit: &dyn ReasoningUnit,
        ctx: &StageContext,
        writer: &EventWriter,
    ) -> Result<String, RouteflowError> {
        let mut budget = self.stream_timeout;
        let mut tokens = self.upstream(name, &mut budget, stage.open(unit, ctx)).await??;
        let mut text = String::new();

        while let Some(chunk) = self.upstream(name, &mut budget, tokens.next()).await? {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            text.push_str(&chunk);
            if !writer.write(PipelineEvent::token(name, chunk)).await {
                debug!(stage = %name, "Caller went away mid-stream");
                break;
            }
        }
        Ok(text)
    }

    /// Awaits `fut` within what is left of the stream budget.
    async fn upstream<F: Future>(
        &self,
        name: StageName,
        budget: &mut Duration,
        fut: F,
    ) -> Result<F::Output, RouteflowError> {
        let started = Instant::now();
        let output = tokio::time::timeout(*budget, fut)
            .await
            .map_err(|_| RouteflowError::timeout(name.as_str(), self.stream_timeout.as_secs_f64()))?;
        *budget = budget.saturating_sub(started.elapsed());
        Ok(output)
    }

    /// Turns an exhausted stage into an error event and a failure record.
    ///
    /// Returns false if the caller has gone away.
    pub async fn isolate(
        &self,
        name: StageName,
        err: &RouteflowError,
        state: &mut SharedState,
        writer: &EventWriter,
    ) -> bool {
        let message = self.failure_message(name, err);
        let attempts = self.attempts_for(name).max(1);

        warn!(stage = %name, attempts, error = %message, "Stage failed");
        self.sink.emit(
            names::STAGE_FAILED,
            serde_json::json!({
                "stage": name,
                "attempts": attempts,
                "error": message,
                "error_type": err.kind(),
            }),
        );
        state.record_error(
            StageFailureRecord::new(name, message.clone())
                .with_error_type(err.kind())
                .with_attempts(attempts),
        );
        writer.write(PipelineEvent::stage_error(name, message)).await
    }

    /// The sanitized caller-facing message for a failed stage.
    #[must_use]
    pub fn failure_message(&self, name: StageName, err: &RouteflowError) -> String {
        let message = RouteflowError::stage_failure(name.as_str(), err.to_string()).to_string();
        self.sanitize(&message)
    }

    /// Redacts pool secrets and secret-shaped substrings.
    #[must_use]
    pub fn sanitize(&self, message: &str) -> String {
        redact_secrets(message, self.pool.iter())
    }

    fn log_attempt(
        &self,
        stage: StageName,
        attempt: usize,
        credential_index: usize,
        credential: &Credential,
        error: Option<String>,
        duration_ms: u64,
    ) {
        self.attempts.lock().push(AttemptRecord {
            stage,
            attempt,
            credential_index,
            credential: credential.masked(),
            error,
            duration_ms,
        });
    }
}

impl std::fmt::Debug for StageExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageExecutor")
            .field("policy", &self.policy)
            .field("attempt_timeout", &self.attempt_timeout)
            .field("stream_timeout", &self.stream_timeout)
            .field("pool_len", &self.pool.len())
            .finish_non_exhaustive()
    }
}
