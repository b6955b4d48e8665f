//! End-to-end tests for request execution.

#[cfg(test)]
mod tests {
    use crate::cancellation::CancellationToken;
    use crate::context::{InMemoryStateLog, PipelineRequest};
    use crate::contracts::{AgentKind, Contract, ContextIntent};
    use crate::core::{PipelineEvent, PipelinePhase, StageName, StageOutput};
    use crate::credentials::{
        Credential, CredentialPool, CredentialPoolManager, CredentialSet, FailureReason,
    };
    use crate::errors::{ReasoningError, RouteflowError};
    use crate::events::{channel, names, CollectingEventSink};
    use crate::pipeline::{ErrorPolicy, Pipeline, PipelineConfig, RunOutcome};
    use crate::reasoning::{tasks, ReasoningUnit};
    use crate::stages::{Activation, InputSource, StageContext, StageDescriptor, StageRegistry, StructuredStage};
    use crate::testing::{
        assert_event_order, assert_single_fatal, error_for, fixtures, streamed_text,
        MockUnitFactory, StaticProbe,
    };
    use async_trait::async_trait;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::Arc;

    const ALL_AGENTS: [&str; 4] = ["ContextAgent", "DataAgent", "ReasoningAgent", "ActionAgent"];

    fn scripted(agents: &[&str]) -> MockUnitFactory {
        MockUnitFactory::new()
            .with_response(tasks::ORCHESTRATOR, fixtures::selection(agents))
            .with_stream(tasks::PLAN, vec!["I'll look ", "that up."])
            .with_response(tasks::CONTEXT, fixtures::context_intent())
            .with_response(tasks::DATA_EXTRACT, serde_json::json!("type: place\nname: Blue Tokai"))
            .with_response(tasks::DATA_COERCE, fixtures::place_report())
            .with_response(tasks::REASONING, fixtures::reasoning_decision())
            .with_response(tasks::ACTION, fixtures::action_report())
            .with_stream(tasks::SUMMARY, vec!["Blue Tokai ", "is your best bet."])
    }

    fn pipeline_with(factory: &MockUnitFactory, keys: usize, config: PipelineConfig) -> Pipeline {
        Pipeline::builder()
            .with_unit_factory(Arc::new(factory.clone()))
            .with_probe(Arc::new(StaticProbe::all_working()))
            .with_credentials(fixtures::credentials(keys))
            .with_config(config)
            .build()
            .unwrap()
    }

    fn pipeline(factory: &MockUnitFactory, keys: usize) -> Pipeline {
        pipeline_with(factory, keys, PipelineConfig::default())
    }

    async fn run(pipeline: &Pipeline, request: PipelineRequest) -> (RunOutcome, Vec<PipelineEvent>) {
        run_with_token(pipeline, request, CancellationToken::new()).await
    }

    async fn run_with_token(
        pipeline: &Pipeline,
        request: PipelineRequest,
        token: CancellationToken,
    ) -> (RunOutcome, Vec<PipelineEvent>) {
        let (writer, stream) = channel(256);
        let outcome = pipeline.run(request, writer, token).await;
        (outcome, stream.collect_all().await)
    }

    #[tokio::test]
    async fn test_empty_selection_goes_straight_to_summary() {
        let factory = scripted(&[]);
        let (outcome, events) = run(&pipeline(&factory, 2), fixtures::greeting_request()).await;

        assert_event_order(&events, &["Orchestrator", "Summary*"]);
        assert!(factory.backend().calls_for(tasks::PLAN).is_empty());
        assert_eq!(factory.backend().calls_for(tasks::SUMMARY).len(), 1);
        assert_eq!(outcome.phase, PipelinePhase::Done);
    }

    #[tokio::test]
    async fn test_context_and_data_run_in_order() {
        let factory = scripted(&["DataAgent", "ContextAgent"]);
        let (_, events) = run(&pipeline(&factory, 3), fixtures::navigation_request()).await;

        assert_event_order(&events, &["Orchestrator", "Plan*", "Context", "Data", "Summary*"]);
        assert_eq!(streamed_text(&events, StageName::Plan), "I'll look that up.");
        assert!(factory.backend().calls_for(tasks::REASONING).is_empty());
        assert!(factory.backend().calls_for(tasks::ACTION).is_empty());
    }

    #[tokio::test]
    async fn test_stage_events_echo_upstream_input() {
        let factory = scripted(&["ContextAgent", "DataAgent"]);
        let (_, events) = run(&pipeline(&factory, 1), fixtures::navigation_request()).await;

        let inputs: Vec<(StageName, serde_json::Value)> = events
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::Stage { stage, input, .. } => Some((*stage, input.clone())),
                _ => None,
            })
            .collect();

        assert_eq!(
            inputs[0],
            (
                StageName::Orchestrator,
                serde_json::json!({"query": "Find a coffee shop near me with good ratings"})
            )
        );
        assert_eq!(inputs[1].1["agentsToUse"], serde_json::json!(["ContextAgent", "DataAgent"]));
        assert_eq!(inputs[2].1, fixtures::context_intent());
    }

    #[tokio::test]
    async fn test_full_run_fills_every_slot() {
        let factory = scripted(&ALL_AGENTS);
        let (outcome, events) = run(&pipeline(&factory, 2), fixtures::navigation_request()).await;

        assert_event_order(
            &events,
            &["Orchestrator", "Plan*", "Context", "Data", "Reasoning", "Action", "Summary*"],
        );
        let state = &outcome.state;
        assert!(state.orchestrator().is_some());
        assert!(state.context().is_some());
        assert_eq!(state.data().map(|d| d.payload.kind()), Some("place"));
        assert!(state.reasoning().is_some());
        assert!(state.action().is_some_and(|a| !a.is_noop()));
        assert!(state.errors().is_empty());
        assert_eq!(state.plan(), Some("I'll look that up."));
        assert_eq!(state.summary(), Some("Blue Tokai is your best bet."));
        assert_eq!(outcome.phase, PipelinePhase::Done);
    }

    #[tokio::test]
    async fn test_one_shot_attempts_bounded_by_pool_and_ceiling() {
        for (keys, expected) in [(1, 1), (2, 2), (3, 3), (4, 3)] {
            let factory = MockUnitFactory::new()
                .with_response(tasks::ORCHESTRATOR, fixtures::selection(&["ContextAgent"]))
                .with_stream(tasks::PLAN, vec!["ok"])
                .with_error(tasks::CONTEXT, ReasoningError::RateLimited("429".into()))
                .with_stream(tasks::SUMMARY, vec!["done"]);

            let (outcome, events) = run(&pipeline(&factory, keys), fixtures::navigation_request()).await;

            let credentials = factory.backend().credentials_for(tasks::CONTEXT);
            assert_eq!(factory.backend().calls_for(tasks::CONTEXT).len(), expected, "keys = {keys}");
            assert_eq!(credentials.len(), expected, "attempts must use distinct keys");
            assert_eq!(outcome.state.latest_error().map(|e| e.attempts), Some(expected));
            assert!(error_for(&events, StageName::Context).is_some());
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_on_next_credential() {
        let factory = MockUnitFactory::new()
            .with_response(tasks::ORCHESTRATOR, fixtures::selection(&["ContextAgent"]))
            .with_stream(tasks::PLAN, vec!["ok"])
            .with_error(tasks::CONTEXT, ReasoningError::Overloaded("busy".into()))
            .with_response(tasks::CONTEXT, fixtures::context_intent())
            .with_stream(tasks::SUMMARY, vec!["done"]);

        let (outcome, events) = run(&pipeline(&factory, 3), fixtures::navigation_request()).await;

        assert_event_order(&events, &["Orchestrator", "Plan*", "Context", "Summary*"]);
        let calls = factory.backend().calls_for(tasks::CONTEXT);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].credential, "KEY_1");
        assert_eq!(calls[1].credential, "KEY_2");
        assert!(outcome.state.errors().is_empty());
    }

    #[tokio::test]
    async fn test_all_probes_failing_emits_single_fatal() {
        let factory = scripted(&ALL_AGENTS);
        let probe = StaticProbe::all_working()
            .with_failure("KEY_1", FailureReason::Invalid)
            .with_failure("KEY_2", FailureReason::QuotaExceeded);
        let pipeline = Pipeline::builder()
            .with_unit_factory(Arc::new(factory.clone()))
            .with_probe(Arc::new(probe))
            .with_credentials(fixtures::credentials(2))
            .build()
            .unwrap();

        let (outcome, events) = run(&pipeline, fixtures::navigation_request()).await;

        assert_single_fatal(&events);
        assert!(events[0].to_wire()["agentData"]
            .as_str()
            .is_some_and(|m| m.contains("All API keys are exhausted")));
        assert_eq!(factory.backend().call_count(), 0);
        assert_eq!(outcome.phase, PipelinePhase::Aborted);
    }

    #[tokio::test]
    async fn test_blank_credentials_are_not_probed() {
        let factory = scripted(&ALL_AGENTS);
        let probe = StaticProbe::all_working();
        let pipeline = Pipeline::builder()
            .with_unit_factory(Arc::new(factory.clone()))
            .with_probe(Arc::new(probe.clone()))
            .with_credentials(CredentialSet::from_lookup("MAPS_KEY", 3, |_| None))
            .build()
            .unwrap();

        let (_, events) = run(&pipeline, fixtures::navigation_request()).await;

        assert_single_fatal(&events);
        assert!(probe.probed().is_empty());
    }

    #[tokio::test]
    async fn test_selection_failure_aborts_request() {
        let factory = MockUnitFactory::new()
            .with_error(tasks::ORCHESTRATOR, ReasoningError::Overloaded("busy".into()))
            .with_stream(tasks::SUMMARY, vec!["unused"]);
        let (outcome, events) = run(&pipeline(&factory, 4), fixtures::navigation_request()).await;

        assert_single_fatal(&events);
        let PipelineEvent::Error { message, .. } = &events[0] else {
            unreachable!();
        };
        assert!(message.starts_with("Selection stage failed"));
        assert_eq!(factory.backend().calls_for(tasks::ORCHESTRATOR).len(), 3);
        assert!(factory.backend().calls_for(tasks::SUMMARY).is_empty());
        assert_eq!(outcome.phase, PipelinePhase::Aborted);
    }

    #[tokio::test]
    async fn test_unknown_agent_name_aborts_request() {
        let factory = MockUnitFactory::new()
            .with_response(tasks::ORCHESTRATOR, serde_json::json!({"agentsToUse": ["WeatherAgent"]}))
            .with_stream(tasks::SUMMARY, vec!["unused"]);
        let (outcome, events) = run(&pipeline(&factory, 1), fixtures::navigation_request()).await;

        assert_single_fatal(&events);
        assert_eq!(outcome.phase, PipelinePhase::Aborted);
    }

    #[tokio::test]
    async fn test_context_failure_does_not_stop_later_stages() {
        let factory = MockUnitFactory::new()
            .with_response(tasks::ORCHESTRATOR, fixtures::selection(&ALL_AGENTS))
            .with_stream(tasks::PLAN, vec!["plan"])
            .with_error(tasks::CONTEXT, ReasoningError::InvalidOutput("garbled".into()))
            .with_response(tasks::DATA_EXTRACT, serde_json::json!("type: place"))
            .with_response(tasks::DATA_COERCE, fixtures::place_report())
            .with_response(tasks::REASONING, fixtures::reasoning_decision())
            .with_response(tasks::ACTION, fixtures::action_report())
            .with_stream(tasks::SUMMARY, vec!["summary"]);

        let (outcome, events) = run(&pipeline(&factory, 2), fixtures::navigation_request()).await;

        assert_event_order(
            &events,
            &["Orchestrator", "Plan*", "Error(Context)", "Data", "Reasoning", "Action", "Summary*"],
        );
        assert!(error_for(&events, StageName::Context).is_some_and(|m| m.starts_with("[Context] failed:")));
        assert!(outcome.state.context().is_none());
        assert_eq!(outcome.state.errors().len(), 1);

        let summary = &factory.backend().calls_for(tasks::SUMMARY)[0];
        assert!(summary.system.contains("[Context] failed:"));
    }

    #[tokio::test]
    async fn test_data_coercion_failure_is_tagged_data() {
        let factory = MockUnitFactory::new()
            .with_response(tasks::ORCHESTRATOR, fixtures::selection(&["DataAgent"]))
            .with_stream(tasks::PLAN, vec!["plan"])
            .with_response(tasks::DATA_EXTRACT, serde_json::json!("it is sunny"))
            .with_response(tasks::DATA_COERCE, serde_json::json!({"type": "weather", "data": []}))
            .with_stream(tasks::SUMMARY, vec!["summary"]);

        let (outcome, events) = run(&pipeline(&factory, 3), fixtures::navigation_request()).await;

        assert_event_order(&events, &["Orchestrator", "Plan*", "Error(Data)", "Summary*"]);
        let record = outcome.state.latest_error().unwrap();
        assert_eq!(record.stage, StageName::Data);
        assert_eq!(record.error_type, "SchemaCoercionFailure");
        // Each attempt covers both phases on the same key.
        assert_eq!(factory.backend().calls_for(tasks::DATA_EXTRACT).len(), 3);
        assert_eq!(factory.backend().calls_for(tasks::DATA_COERCE).len(), 3);
    }

    #[tokio::test]
    async fn test_plan_failure_is_isolated() {
        let factory = MockUnitFactory::new()
            .with_response(tasks::ORCHESTRATOR, fixtures::selection(&["ContextAgent"]))
            .with_stream_error(tasks::PLAN, ReasoningError::Transport("reset".into()))
            .with_response(tasks::CONTEXT, fixtures::context_intent())
            .with_stream(tasks::SUMMARY, vec!["summary"]);

        let (outcome, events) = run(&pipeline(&factory, 3), fixtures::navigation_request()).await;

        assert_event_order(&events, &["Orchestrator", "Error(Plan)", "Context", "Summary*"]);
        assert_eq!(factory.backend().calls_for(tasks::PLAN).len(), 1);
        assert_eq!(outcome.phase, PipelinePhase::Done);
    }

    #[tokio::test]
    async fn test_summary_mid_stream_failure_keeps_partial_tokens() {
        let factory = MockUnitFactory::new()
            .with_response(tasks::ORCHESTRATOR, fixtures::selection(&[]))
            .with_broken_stream(
                tasks::SUMMARY,
                vec!["Half an ", "answer"],
                ReasoningError::Transport("connection reset".into()),
            );

        let (outcome, events) = run(&pipeline(&factory, 2), fixtures::greeting_request()).await;

        assert_event_order(&events, &["Orchestrator", "Summary*", "Error(Summary)"]);
        assert_eq!(streamed_text(&events, StageName::Summary), "Half an answer");
        assert_eq!(outcome.phase, PipelinePhase::Done);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let factory = scripted(&ALL_AGENTS);
        let token = CancellationToken::new();
        token.cancel("user closed the tab");

        let (outcome, events) =
            run_with_token(&pipeline(&factory, 2), fixtures::navigation_request(), token).await;

        assert_single_fatal(&events);
        assert_eq!(
            events[0].to_wire()["agentData"],
            "Pipeline cancelled: user closed the tab"
        );
        assert_eq!(factory.backend().call_count(), 0);
        assert_eq!(outcome.phase, PipelinePhase::Cancelled);
    }

    #[derive(Debug)]
    struct CancellingContextStage {
        token: CancellationToken,
    }

    #[async_trait]
    impl StructuredStage for CancellingContextStage {
        async fn run(
            &self,
            _unit: &dyn ReasoningUnit,
            _ctx: &StageContext,
        ) -> Result<StageOutput, RouteflowError> {
            self.token.cancel("superseded by a newer request");
            Ok(StageOutput::Context(ContextIntent::coerce(fixtures::context_intent())?))
        }
    }

    #[tokio::test]
    async fn test_cancellation_checked_between_stages() {
        let factory = scripted(&ALL_AGENTS);
        let token = CancellationToken::new();
        let stage_token = token.clone();
        let registry = StageRegistry::standard()
            .with_stage(
                StageDescriptor::one_shot(
                    StageName::Context,
                    Activation::WhenSelected(AgentKind::ContextAgent),
                    move || CancellingContextStage {
                        token: stage_token.clone(),
                    },
                )
                .with_input(InputSource::Slot(StageName::Orchestrator)),
            )
            .unwrap();
        let pipeline = Pipeline::builder()
            .with_unit_factory(Arc::new(factory.clone()))
            .with_probe(Arc::new(StaticProbe::all_working()))
            .with_credentials(fixtures::credentials(2))
            .with_registry(registry)
            .build()
            .unwrap();

        let (outcome, events) = run_with_token(&pipeline, fixtures::navigation_request(), token).await;

        assert_event_order(&events, &["Orchestrator", "Plan*", "Context", "Error"]);
        assert!(factory.backend().calls_for(tasks::DATA_EXTRACT).is_empty());
        assert!(factory.backend().calls_for(tasks::SUMMARY).is_empty());
        assert_eq!(outcome.phase, PipelinePhase::Cancelled);
        assert!(outcome.state.context().is_some());
    }

    #[tokio::test]
    async fn test_dropped_stream_stops_the_run() {
        let factory = scripted(&ALL_AGENTS);
        let (writer, stream) = channel(4);
        drop(stream);

        let outcome = pipeline(&factory, 2)
            .run(fixtures::navigation_request(), writer, CancellationToken::new())
            .await;

        assert_eq!(outcome.phase, PipelinePhase::Cancelled);
        assert_eq!(factory.backend().call_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_streams_from_background_task() {
        let factory = scripted(&["ContextAgent", "DataAgent"]);
        let events: Vec<PipelineEvent> = pipeline(&factory, 2)
            .execute(fixtures::navigation_request())
            .collect()
            .await;

        assert_event_order(&events, &["Orchestrator", "Plan*", "Context", "Data", "Summary*"]);
    }

    #[tokio::test]
    async fn test_execute_with_pool_skips_probe() {
        let factory = scripted(&[]);
        let probe = StaticProbe::all_working();
        let pipeline = Pipeline::builder()
            .with_unit_factory(Arc::new(factory.clone()))
            .with_probe(Arc::new(probe.clone()))
            .with_credentials(fixtures::credentials(3))
            .build()
            .unwrap();
        let pool = CredentialPool::new(vec![Credential::new("SESSION_KEY", "session-secret")]);

        let events = pipeline
            .execute_with_pool(fixtures::greeting_request(), pool)
            .collect_all()
            .await;

        assert_event_order(&events, &["Orchestrator", "Summary*"]);
        assert!(probe.probed().is_empty());
        let used: HashSet<String> = factory.backend().calls().into_iter().map(|c| c.credential).collect();
        assert_eq!(used, HashSet::from(["SESSION_KEY".to_string()]));
    }

    #[tokio::test]
    async fn test_probe_is_idempotent() {
        let probe = StaticProbe::all_working().with_failure("KEY_2", FailureReason::Overloaded);
        let manager = CredentialPoolManager::new(Arc::new(probe));
        let candidates = fixtures::credentials(3);

        let first = manager.probe(candidates.candidates()).await;
        let second = manager.probe(candidates.candidates()).await;

        assert_eq!(first.statuses(), second.statuses());
        assert_eq!(first.working(), second.working());
    }

    #[tokio::test]
    async fn test_state_log_receives_final_state() {
        let factory = scripted(&["ContextAgent"]);
        let log = Arc::new(InMemoryStateLog::new());
        let pipeline = Pipeline::builder()
            .with_unit_factory(Arc::new(factory.clone()))
            .with_probe(Arc::new(StaticProbe::all_working()))
            .with_credentials(fixtures::credentials(1))
            .with_state_log(log.clone())
            .build()
            .unwrap();
        let request = fixtures::navigation_request();
        let request_id = request.request_id;

        run(&pipeline, request).await;

        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].request_id, request_id);
        assert_eq!(records[0].phase, PipelinePhase::Done);
        assert_eq!(records[0].state["context"]["intent"], "find_place");
    }

    #[tokio::test]
    async fn test_error_policy_controls_error_slot() {
        let failing = || {
            MockUnitFactory::new()
                .with_response(tasks::ORCHESTRATOR, fixtures::selection(&["ContextAgent", "ReasoningAgent"]))
                .with_stream(tasks::PLAN, vec!["plan"])
                .with_error(tasks::CONTEXT, ReasoningError::EmptyResponse)
                .with_error(tasks::REASONING, ReasoningError::EmptyResponse)
                .with_stream(tasks::SUMMARY, vec!["summary"])
        };

        let (accumulated, _) = run(&pipeline(&failing(), 1), fixtures::navigation_request()).await;
        assert_eq!(accumulated.state.errors().len(), 2);

        let config = PipelineConfig::default().with_error_policy(ErrorPolicy::LastWriteWins);
        let (latest, _) = run(&pipeline_with(&failing(), 1, config), fixtures::navigation_request()).await;
        assert_eq!(latest.state.errors().len(), 1);
        assert_eq!(latest.state.latest_error().map(|e| e.stage), Some(StageName::Reasoning));
    }

    #[tokio::test]
    async fn test_secrets_never_reach_the_caller() {
        let factory = MockUnitFactory::new()
            .with_response(tasks::ORCHESTRATOR, fixtures::selection(&["ActionAgent"]))
            .with_stream(tasks::PLAN, vec!["plan"])
            .with_error(
                tasks::ACTION,
                ReasoningError::Unauthorized("key secret-value-0001 is not valid".into()),
            )
            .with_stream(tasks::SUMMARY, vec!["summary"]);

        let (outcome, events) = run(&pipeline(&factory, 1), fixtures::navigation_request()).await;

        let wire = serde_json::to_string(&events).unwrap();
        assert!(!wire.contains("secret-value-0001"));
        assert!(wire.contains("...0001"));
        assert!(outcome.attempts.iter().all(|a| !a.credential.contains("secret")));
    }

    #[tokio::test]
    async fn test_lifecycle_events_reach_sink() {
        let factory = scripted(&["ContextAgent"]);
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = Pipeline::builder()
            .with_unit_factory(Arc::new(factory.clone()))
            .with_probe(Arc::new(StaticProbe::all_working()))
            .with_credentials(fixtures::credentials(1))
            .with_event_sink(sink.clone())
            .build()
            .unwrap();

        run(&pipeline, fixtures::navigation_request()).await;

        let names = sink.names();
        assert_eq!(names.first().map(String::as_str), Some(names::POOL_PROBED));
        assert_eq!(names.last().map(String::as_str), Some(names::PIPELINE_COMPLETED));
        assert_eq!(sink.events_named(names::STAGE_SKIPPED).len(), 3);
        assert_eq!(sink.events_named(names::STAGE_COMPLETED).len(), 4);
    }

    #[tokio::test]
    async fn test_wire_format_of_a_run() {
        let factory = scripted(&["ContextAgent"]);
        let (_, events) = run(&pipeline(&factory, 1), fixtures::navigation_request()).await;

        let wire: Vec<serde_json::Value> = events.iter().map(PipelineEvent::to_wire).collect();
        assert_eq!(wire[0]["type"], "stage");
        assert_eq!(wire[0]["stage"], "Orchestrator");
        assert_eq!(wire[1], serde_json::json!({"type": "token", "stage": "Plan", "delta": "I'll look "}));
        assert_eq!(wire[3]["stage"], "Context");
        assert_eq!(wire[3]["agentData"]["intent"], "find_place");
    }
}
