//! The per-request scheduler and its builder.
//!
//! A request moves strictly forward: probe the credential pool, run the
//! mandatory selection stage, run each activated middle stage in registry
//! order, then always run the summary stage. Only an empty pool or a failed
//! selection aborts the request; every other failure becomes an error event
//! and the run continues.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{AttemptRecord, PipelineConfig, StageExecutor};
use crate::cancellation::CancellationToken;
use crate::context::{NoOpStateLog, PipelineRequest, SharedState, StateLog, StateRecord};
use crate::contracts::SelectionDecision;
use crate::core::{PipelineEvent, PipelinePhase, StageName, StageOutput};
use crate::credentials::{
    CredentialPool, CredentialPoolManager, CredentialProbe, CredentialSet, StreamingHealthProbe,
};
use crate::errors::RouteflowError;
use crate::events::{channel, names, EventSink, EventStream, EventWriter, NoOpEventSink};
use crate::reasoning::ReasoningUnitFactory;
use crate::stages::{StageContext, StageDescriptor, StageRegistry, StageRunner};
use crate::utils::elapsed_ms;

/// What a finished request looked like.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The request id.
    pub request_id: Uuid,
    /// The terminal phase: `Done`, `Aborted` or `Cancelled`.
    pub phase: PipelinePhase,
    /// The final shared state.
    pub state: SharedState,
    /// Every stage attempt, in order.
    pub attempts: Vec<AttemptRecord>,
}

/// A configured pipeline. Cheap to clone; every request gets fresh state.
#[derive(Clone)]
pub struct Pipeline {
    registry: Arc<StageRegistry>,
    factory: Arc<dyn ReasoningUnitFactory>,
    pool_manager: CredentialPoolManager,
    candidates: CredentialSet,
    config: PipelineConfig,
    sink: Arc<dyn EventSink>,
    state_log: Arc<dyn StateLog>,
}

impl Pipeline {
    /// Starts building a pipeline.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// The stage registry.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs `request` in the background and returns its event stream.
    #[must_use]
    pub fn execute(&self, request: PipelineRequest) -> EventStream {
        self.execute_with_cancellation(request, CancellationToken::new())
    }

    /// Like [`execute`](Self::execute), stopping before the next stage once
    /// `token` is cancelled.
    #[must_use]
    pub fn execute_with_cancellation(
        &self,
        request: PipelineRequest,
        token: CancellationToken,
    ) -> EventStream {
        let (writer, stream) = channel(self.config.channel_capacity);
        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.run(request, writer, token).await;
        });
        stream
    }

    /// Runs `request` against an already probed pool in the background.
    #[must_use]
    pub fn execute_with_pool(&self, request: PipelineRequest, pool: CredentialPool) -> EventStream {
        let (writer, stream) = channel(self.config.channel_capacity);
        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline
                .run_with_pool(request, pool, writer, CancellationToken::new())
                .await;
        });
        stream
    }

    /// Runs `request` to completion and collects its events.
    pub async fn collect(&self, request: PipelineRequest) -> Vec<PipelineEvent> {
        self.execute(request).collect_all().await
    }

    /// Probes the credential pool, then runs `request`, writing into `writer`.
    pub async fn run(
        &self,
        request: PipelineRequest,
        writer: EventWriter,
        token: CancellationToken,
    ) -> RunOutcome {
        let span = info_span!("pipeline", request_id = %request.request_id);
        async {
            let report = self.pool_manager.probe(self.candidates.candidates()).await;
            self.sink.emit(
                names::POOL_PROBED,
                serde_json::json!({
                    "candidates": report.statuses().len(),
                    "working": report.working().len(),
                    "statuses": report.statuses(),
                }),
            );

            match report.into_pool() {
                Ok(pool) => self.drive(request, pool, writer, token).await,
                Err(err) => {
                    let mut run = RequestRun::new(self, request, CredentialPool::new(Vec::new()), writer, token);
                    run.abort(err.into()).await;
                    run.finish().await
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Runs `request` against an already probed pool.
    pub async fn run_with_pool(
        &self,
        request: PipelineRequest,
        pool: CredentialPool,
        writer: EventWriter,
        token: CancellationToken,
    ) -> RunOutcome {
        let span = info_span!("pipeline", request_id = %request.request_id);
        self.drive(request, pool, writer, token).instrument(span).await
    }

    async fn drive(
        &self,
        request: PipelineRequest,
        pool: CredentialPool,
        writer: EventWriter,
        token: CancellationToken,
    ) -> RunOutcome {
        let mut run = RequestRun::new(self, request, pool, writer, token);
        run.drive().await;
        run.finish().await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("registry", &self.registry)
            .field("candidates", &self.candidates.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The mutable side of one request.
struct RequestRun<'a> {
    pipeline: &'a Pipeline,
    request: Arc<PipelineRequest>,
    executor: StageExecutor,
    writer: EventWriter,
    token: CancellationToken,
    state: SharedState,
    phase: PipelinePhase,
    started: Instant,
}

impl<'a> RequestRun<'a> {
    fn new(
        pipeline: &'a Pipeline,
        request: PipelineRequest,
        pool: CredentialPool,
        writer: EventWriter,
        token: CancellationToken,
    ) -> Self {
        let executor = StageExecutor::new(
            &pipeline.config,
            Arc::clone(&pipeline.factory),
            Arc::clone(&pipeline.sink),
            pool,
        );
        Self {
            pipeline,
            request: Arc::new(request),
            executor,
            writer,
            token,
            state: SharedState::new().with_error_policy(pipeline.config.error_policy),
            phase: PipelinePhase::Idle,
            started: Instant::now(),
        }
    }

    async fn drive(&mut self) {
        let registry = Arc::clone(&self.pipeline.registry);

        if self.interrupted().await {
            return;
        }
        let decision = match self.select(registry.selection()).await {
            Ok(decision) => decision,
            Err(err) => {
                self.abort(err).await;
                return;
            }
        };
        info!(
            agents = ?decision.agents_to_use,
            "Selection finished"
        );

        for descriptor in registry.middle() {
            if self.interrupted().await {
                return;
            }
            if !descriptor.activation().is_active(&decision) {
                debug!(stage = %descriptor.name(), "Stage not activated");
                self.pipeline.sink.emit(
                    names::STAGE_SKIPPED,
                    serde_json::json!({"stage": descriptor.name(), "reason": "not selected"}),
                );
                continue;
            }
            if !self.run_stage(descriptor).await {
                self.closed();
                return;
            }
        }

        if self.interrupted().await {
            return;
        }
        if !self.run_stage(registry.summary()).await {
            self.closed();
            return;
        }

        self.phase = PipelinePhase::Done;
        self.pipeline.sink.emit(
            names::PIPELINE_COMPLETED,
            serde_json::json!({
                "duration_ms": elapsed_ms(self.started),
                "errors": self.state.errors().len(),
            }),
        );
        info!(
            duration_ms = elapsed_ms(self.started),
            errors = self.state.errors().len(),
            "Pipeline completed"
        );
    }

    fn enter(&mut self, stage: StageName) {
        self.phase = stage.phase();
        debug!(stage = %stage, phase = %self.phase, "Entering stage");
        self.pipeline
            .sink
            .emit(names::STAGE_STARTED, serde_json::json!({"stage": stage}));
    }

    /// Runs the selection stage. Its failure aborts the request.
    async fn select(&mut self, descriptor: &StageDescriptor) -> Result<SelectionDecision, RouteflowError> {
        let name = descriptor.name();
        self.enter(name);

        let StageRunner::OneShot(stage) = descriptor.instantiate() else {
            return Err(RouteflowError::InvalidRegistry(format!(
                "selection stage '{name}' must be one-shot"
            )));
        };
        let input = descriptor.input().resolve(&self.request, &self.state);
        let ctx = StageContext::new(Arc::clone(&self.request), self.state.clone());

        let output = self
            .executor
            .run_one_shot(name, stage.as_ref(), &ctx)
            .await
            .map_err(|err| RouteflowError::FatalSelectionFailure {
                message: self.executor.sanitize(&err.to_string()),
            })?;
        let decision = output.as_selection().cloned().ok_or_else(|| {
            RouteflowError::FatalSelectionFailure {
                message: format!("stage '{name}' did not produce a selection decision"),
            }
        })?;

        self.commit(name, output, input).await?;
        self.pipeline.sink.emit(
            names::STAGE_COMPLETED,
            serde_json::json!({"stage": name, "agents": decision.agents_to_use}),
        );
        Ok(decision)
    }

    /// Runs a non-selection stage with failure isolation.
    ///
    /// Returns false once the caller has gone away.
    async fn run_stage(&mut self, descriptor: &StageDescriptor) -> bool {
        let name = descriptor.name();
        self.enter(name);

        let started = Instant::now();
        let input = descriptor.input().resolve(&self.request, &self.state);
        let ctx = StageContext::new(Arc::clone(&self.request), self.state.clone());

        let result = match descriptor.instantiate() {
            StageRunner::OneShot(stage) => {
                match self.executor.run_one_shot(name, stage.as_ref(), &ctx).await {
                    Ok(output) => self.commit(name, output, input).await,
                    Err(err) => Err(err),
                }
            }
            StageRunner::Streaming(stage) => {
                match self
                    .executor
                    .run_streaming(name, stage.as_ref(), &ctx, &self.writer)
                    .await
                {
                    Ok(text) => {
                        self.keep_text(name, text);
                        Ok(!self.writer.is_closed())
                    }
                    Err(err) => Err(err),
                }
            }
        };

        match result {
            Ok(alive) => {
                self.pipeline.sink.emit(
                    names::STAGE_COMPLETED,
                    serde_json::json!({
                        "stage": name,
                        "duration_ms": elapsed_ms(started),
                    }),
                );
                alive
            }
            Err(err) => {
                self.executor
                    .isolate(name, &err, &mut self.state, &self.writer)
                    .await
            }
        }
    }

    /// Records a structured output and emits its event.
    ///
    /// Returns false if the caller has gone away.
    async fn commit(
        &mut self,
        name: StageName,
        output: StageOutput,
        input: serde_json::Value,
    ) -> Result<bool, RouteflowError> {
        if output.stage() != name {
            return Err(RouteflowError::stage_failure(
                name.as_str(),
                format!("produced output for the '{}' slot", output.stage()),
            ));
        }
        let agent_data = output.to_value()?;
        self.state.record(output)?;
        Ok(self
            .writer
            .write(PipelineEvent::stage(name, agent_data, input))
            .await)
    }

    fn keep_text(&mut self, name: StageName, text: String) {
        match name {
            StageName::Plan => self.state.set_plan(text),
            StageName::Summary => self.state.set_summary(text),
            _ => {}
        }
    }

    /// Checks the stream and the cancellation token before a stage.
    async fn interrupted(&mut self) -> bool {
        if self.writer.is_closed() {
            self.closed();
            return true;
        }
        if let Err(err) = self.token.check() {
            info!(reason = %err, "Pipeline cancelled");
            self.phase = PipelinePhase::Cancelled;
            self.pipeline.sink.emit(
                names::PIPELINE_CANCELLED,
                serde_json::json!({"reason": self.token.reason()}),
            );
            self.writer.write(PipelineEvent::fatal(err.to_string())).await;
            return true;
        }
        false
    }

    fn closed(&mut self) {
        info!(phase = %self.phase, "Caller dropped the event stream, stopping");
        self.phase = PipelinePhase::Cancelled;
        self.pipeline.sink.emit(
            names::PIPELINE_CANCELLED,
            serde_json::json!({"reason": "stream closed"}),
        );
    }

    /// Emits the single request-level error.
    async fn abort(&mut self, err: RouteflowError) {
        let message = self.executor.sanitize(&err.to_string());
        error!(error = %message, error_type = err.kind(), phase = %self.phase, "Pipeline aborted");
        self.phase = PipelinePhase::Aborted;
        self.pipeline.sink.emit(
            names::PIPELINE_ABORTED,
            serde_json::json!({"error": message, "error_type": err.kind()}),
        );
        self.writer.write(PipelineEvent::fatal(message)).await;
    }

    async fn finish(self) -> RunOutcome {
        let state_json = serde_json::to_value(&self.state).unwrap_or_else(|err| {
            warn!(error = %err, "Could not serialize final state");
            serde_json::Value::Null
        });
        self.pipeline
            .state_log
            .append(StateRecord::new(self.request.request_id, self.phase, state_json))
            .await;

        RunOutcome {
            request_id: self.request.request_id,
            phase: self.phase,
            attempts: self.executor.attempts(),
            state: self.state,
        }
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    registry: Option<StageRegistry>,
    factory: Option<Arc<dyn ReasoningUnitFactory>>,
    probe: Option<Arc<dyn CredentialProbe>>,
    candidates: Option<CredentialSet>,
    config: PipelineConfig,
    sink: Option<Arc<dyn EventSink>>,
    state_log: Option<Arc<dyn StateLog>>,
}

impl PipelineBuilder {
    /// Creates a builder with the standard registry and default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stage registry.
    #[must_use]
    pub fn with_registry(mut self, registry: StageRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the reasoning-unit factory. Required.
    #[must_use]
    pub fn with_unit_factory(mut self, factory: Arc<dyn ReasoningUnitFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets the credential probe. Defaults to a streaming health probe.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn CredentialProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Sets the candidate credentials. Defaults to the numbered environment
    /// variables named by the config.
    #[must_use]
    pub fn with_credentials(mut self, candidates: CredentialSet) -> Self {
        self.candidates = Some(candidates);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the telemetry sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets the state log.
    #[must_use]
    pub fn with_state_log(mut self, log: Arc<dyn StateLog>) -> Self {
        self.state_log = Some(log);
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`RouteflowError::Config`] if no unit factory was given or the
    /// config is invalid.
    pub fn build(self) -> Result<Pipeline, RouteflowError> {
        self.config.validate()?;
        let factory = self
            .factory
            .ok_or_else(|| RouteflowError::Config("a reasoning unit factory is required".to_string()))?;
        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(StreamingHealthProbe::new(Arc::clone(&factory))));
        let candidates = self.candidates.unwrap_or_else(|| {
            CredentialSet::from_env(&self.config.credential_prefix, self.config.credential_count)
        });

        Ok(Pipeline {
            registry: Arc::new(self.registry.unwrap_or_default()),
            factory,
            pool_manager: CredentialPoolManager::new(probe)
                .with_probe_timeout(self.config.probe_timeout()),
            candidates,
            config: self.config,
            sink: self.sink.unwrap_or_else(|| Arc::new(NoOpEventSink)),
            state_log: self.state_log.unwrap_or_else(|| Arc::new(NoOpStateLog)),
        })
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("registry", &self.registry)
            .field("has_factory", &self.factory.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
