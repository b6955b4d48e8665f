//! Assertions over pipeline event sequences.

use crate::core::{PipelineEvent, StageName};

/// Labels events for order checks.
///
/// Stage events become their stage name, errors become `Error(<origin>)` or
/// `Error`, and each run of consecutive tokens from one stage becomes
/// `<stage>*`.
#[must_use]
pub fn event_labels(events: &[PipelineEvent]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for event in events {
        let label = match event {
            PipelineEvent::Stage { stage, .. } => stage.to_string(),
            PipelineEvent::Error { origin: Some(stage), .. } => format!("Error({stage})"),
            PipelineEvent::Error { origin: None, .. } => "Error".to_string(),
            PipelineEvent::Token { stage, .. } => format!("{stage}*"),
        };
        if event.is_token() && labels.last() == Some(&label) {
            continue;
        }
        labels.push(label);
    }
    labels
}

/// Asserts the collapsed event order.
pub fn assert_event_order(events: &[PipelineEvent], expected: &[&str]) {
    let labels = event_labels(events);
    assert_eq!(
        labels, expected,
        "Unexpected event order. Full events: {events:?}"
    );
}

/// Concatenates the token deltas of one stage.
#[must_use]
pub fn streamed_text(events: &[PipelineEvent], stage: StageName) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::Token { stage: s, delta } if *s == stage => Some(delta.as_str()),
            _ => None,
        })
        .collect()
}

/// Asserts that exactly one event was emitted and it is a request-level error.
pub fn assert_single_fatal(events: &[PipelineEvent]) {
    assert_eq!(events.len(), 1, "Expected a single event, got {events:?}");
    assert!(
        matches!(events[0], PipelineEvent::Error { origin: None, .. }),
        "Expected a request-level error, got {:?}",
        events[0]
    );
}

/// Returns the message of the error event tagged with `stage`.
#[must_use]
pub fn error_for(events: &[PipelineEvent], stage: StageName) -> Option<&str> {
    events.iter().find_map(|event| match event {
        PipelineEvent::Error {
            origin: Some(origin),
            message,
        } if *origin == stage => Some(message.as_str()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_collapse_token_runs() {
        let events = vec![
            PipelineEvent::stage(StageName::Orchestrator, serde_json::Value::Null, serde_json::Value::Null),
            PipelineEvent::token(StageName::Plan, "a"),
            PipelineEvent::token(StageName::Plan, "b"),
            PipelineEvent::stage_error(StageName::Context, "boom"),
            PipelineEvent::token(StageName::Summary, "c"),
        ];

        assert_event_order(&events, &["Orchestrator", "Plan*", "Error(Context)", "Summary*"]);
        assert_eq!(streamed_text(&events, StageName::Plan), "ab");
        assert_eq!(error_for(&events, StageName::Context), Some("boom"));
        assert_eq!(error_for(&events, StageName::Data), None);
    }

    #[test]
    fn test_single_fatal() {
        assert_single_fatal(&[PipelineEvent::fatal("All API keys are exhausted")]);
    }
}
