//! Scripted reasoning units and probes for testing.

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::credentials::{Credential, CredentialProbe, FailureReason, ProbeOutcome};
use crate::errors::ReasoningError;
use crate::reasoning::{Prompt, ReasoningUnit, ReasoningUnitFactory, StreamRequest, TokenStream};

/// One call seen by the mock backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Label of the credential the unit was bound to.
    pub credential: String,
    /// Task name.
    pub task: String,
    /// System instructions.
    pub system: String,
    /// Prompt text; for streams, the last message.
    pub text: String,
    /// Requested contract, if any.
    pub schema: Option<String>,
}

#[derive(Debug, Clone)]
struct StreamScript {
    chunks: Vec<String>,
    tail_error: Option<ReasoningError>,
    open_error: Option<ReasoningError>,
}

/// Pops the next scripted item; the last one stays for later calls.
fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

/// Shared script and call log behind every unit a [`MockUnitFactory`] creates.
#[derive(Debug, Default)]
pub struct MockBackend {
    responses: Mutex<HashMap<String, VecDeque<Result<serde_json::Value, ReasoningError>>>>,
    streams: Mutex<HashMap<String, VecDeque<StreamScript>>>,
    delays: Mutex<HashMap<String, Duration>>,
    failing: Mutex<HashMap<String, ReasoningError>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockBackend {
    /// Every call in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Calls for one task in order.
    #[must_use]
    pub fn calls_for(&self, task: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.task == task)
            .cloned()
            .collect()
    }

    /// Distinct credential labels used for one task.
    #[must_use]
    pub fn credentials_for(&self, task: &str) -> HashSet<String> {
        self.calls_for(task)
            .into_iter()
            .map(|call| call.credential)
            .collect()
    }

    /// Number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Clears the call log, keeping scripts.
    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, credential: &str, task: &str, system: &str, text: &str, schema: Option<&str>) {
        self.calls.lock().push(RecordedCall {
            credential: credential.to_string(),
            task: task.to_string(),
            system: system.to_string(),
            text: text.to_string(),
            schema: schema.map(str::to_string),
        });
    }

    async fn pause(&self, task: &str) {
        let delay = self.delays.lock().get(task).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn generate(&self, credential: &str, prompt: &Prompt) -> Result<serde_json::Value, ReasoningError> {
        self.record(
            credential,
            &prompt.task,
            &prompt.system,
            &prompt.text,
            prompt.schema.as_deref(),
        );
        self.pause(&prompt.task).await;

        if let Some(err) = self.failing.lock().get(credential).cloned() {
            return Err(err);
        }
        self.responses
            .lock()
            .get_mut(&prompt.task)
            .and_then(next_scripted)
            .unwrap_or_else(|| {
                Err(ReasoningError::InvalidOutput(format!(
                    "no scripted response for '{}'",
                    prompt.task
                )))
            })
    }

    async fn stream(&self, credential: &str, request: &StreamRequest) -> Result<TokenStream, ReasoningError> {
        let last = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.record(credential, &request.task, &request.system, &last, None);
        self.pause(&request.task).await;

        if let Some(err) = self.failing.lock().get(credential).cloned() {
            return Err(err);
        }
        let script = self
            .streams
            .lock()
            .get_mut(&request.task)
            .and_then(next_scripted)
            .ok_or_else(|| {
                ReasoningError::InvalidOutput(format!("no scripted stream for '{}'", request.task))
            })?;
        if let Some(err) = script.open_error {
            return Err(err);
        }

        let mut items: Vec<Result<String, ReasoningError>> =
            script.chunks.into_iter().map(Ok).collect();
        if let Some(err) = script.tail_error {
            items.push(Err(err));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

/// A reasoning unit bound to one credential label.
#[derive(Debug, Clone)]
pub struct MockReasoningUnit {
    credential: String,
    backend: Arc<MockBackend>,
}

impl MockReasoningUnit {
    /// The bound credential label.
    #[must_use]
    pub fn credential(&self) -> &str {
        &self.credential
    }
}

#[async_trait]
impl ReasoningUnit for MockReasoningUnit {
    async fn generate(&self, prompt: &Prompt) -> Result<serde_json::Value, ReasoningError> {
        self.backend.generate(&self.credential, prompt).await
    }

    async fn stream(&self, request: &StreamRequest) -> Result<TokenStream, ReasoningError> {
        self.backend.stream(&self.credential, request).await
    }
}

/// Builds [`MockReasoningUnit`]s over a shared script.
///
/// Scripted items are consumed in order per task; the last one repeats.
#[derive(Debug, Clone, Default)]
pub struct MockUnitFactory {
    backend: Arc<MockBackend>,
}

impl MockUnitFactory {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared backend, for inspecting calls.
    #[must_use]
    pub fn backend(&self) -> &Arc<MockBackend> {
        &self.backend
    }

    fn push_response(self, task: &str, item: Result<serde_json::Value, ReasoningError>) -> Self {
        self.backend
            .responses
            .lock()
            .entry(task.to_string())
            .or_default()
            .push_back(item);
        self
    }

    fn push_stream(self, task: &str, script: StreamScript) -> Self {
        self.backend
            .streams
            .lock()
            .entry(task.to_string())
            .or_default()
            .push_back(script);
        self
    }

    /// Queues a structured response for `task`.
    #[must_use]
    pub fn with_response(self, task: &str, value: serde_json::Value) -> Self {
        self.push_response(task, Ok(value))
    }

    /// Queues several structured responses for `task`.
    #[must_use]
    pub fn with_responses(self, task: &str, values: Vec<serde_json::Value>) -> Self {
        values
            .into_iter()
            .fold(self, |factory, value| factory.with_response(task, value))
    }

    /// Queues a failure for `task`.
    #[must_use]
    pub fn with_error(self, task: &str, err: ReasoningError) -> Self {
        self.push_response(task, Err(err))
    }

    /// Queues a token stream for `task`.
    #[must_use]
    pub fn with_stream<S: Into<String>>(self, task: &str, chunks: Vec<S>) -> Self {
        self.push_stream(
            task,
            StreamScript {
                chunks: chunks.into_iter().map(Into::into).collect(),
                tail_error: None,
                open_error: None,
            },
        )
    }

    /// Queues a stream that yields `chunks` and then fails.
    #[must_use]
    pub fn with_broken_stream<S: Into<String>>(
        self,
        task: &str,
        chunks: Vec<S>,
        err: ReasoningError,
    ) -> Self {
        self.push_stream(
            task,
            StreamScript {
                chunks: chunks.into_iter().map(Into::into).collect(),
                tail_error: Some(err),
                open_error: None,
            },
        )
    }

    /// Queues a stream that fails to open.
    #[must_use]
    pub fn with_stream_error(self, task: &str, err: ReasoningError) -> Self {
        self.push_stream(
            task,
            StreamScript {
                chunks: Vec::new(),
                tail_error: None,
                open_error: Some(err),
            },
        )
    }

    /// Delays every call for `task`.
    #[must_use]
    pub fn with_delay(self, task: &str, delay: Duration) -> Self {
        self.backend.delays.lock().insert(task.to_string(), delay);
        self
    }

    /// Fails every call made with the credential labelled `label`.
    #[must_use]
    pub fn with_failing_credential(self, label: &str, err: ReasoningError) -> Self {
        self.backend.failing.lock().insert(label.to_string(), err);
        self
    }
}

impl ReasoningUnitFactory for MockUnitFactory {
    fn create(&self, credential: &Credential, _model_hint: Option<&str>) -> Arc<dyn ReasoningUnit> {
        Arc::new(MockReasoningUnit {
            credential: credential.label().to_string(),
            backend: Arc::clone(&self.backend),
        })
    }
}

/// A probe with fixed answers per label.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    failures: HashMap<String, FailureReason>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StaticProbe {
    /// Every non-blank credential works.
    #[must_use]
    pub fn all_working() -> Self {
        Self::default()
    }

    /// Marks one label as failing.
    #[must_use]
    pub fn with_failure(mut self, label: &str, reason: FailureReason) -> Self {
        self.failures.insert(label.to_string(), reason);
        self
    }

    /// Sleeps before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Labels probed so far.
    #[must_use]
    pub fn probed(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CredentialProbe for StaticProbe {
    async fn probe(&self, credential: &Credential) -> Result<ProbeOutcome, ReasoningError> {
        self.calls.lock().push(credential.label().to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(match self.failures.get(credential.label()) {
            Some(reason) => ProbeOutcome::failed(*reason),
            None => ProbeOutcome::working(),
        })
    }
}
