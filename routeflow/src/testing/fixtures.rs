//! Canned requests, credentials and stage outputs.

use serde_json::json;

use crate::context::{ChatMessage, GeoPoint, PipelineRequest};
use crate::credentials::{Credential, CredentialSet};

/// A navigation request located in Pune.
#[must_use]
pub fn navigation_request() -> PipelineRequest {
    PipelineRequest::new(vec![
        ChatMessage::user("Hi"),
        ChatMessage::assistant("Hello! Where would you like to go?"),
        ChatMessage::user("Find a coffee shop near me with good ratings"),
    ])
    .with_location(GeoPoint::new(18.52, 73.85))
}

/// A small-talk request with no location.
#[must_use]
pub fn greeting_request() -> PipelineRequest {
    PipelineRequest::from_query("hello there")
}

/// `n` working-looking credentials labelled `KEY_1..=KEY_n`.
#[must_use]
pub fn credentials(n: usize) -> CredentialSet {
    (1..=n)
        .map(|i| Credential::new(format!("KEY_{i}"), format!("secret-value-{i:04}")))
        .collect::<Vec<_>>()
        .into()
}

/// A selection decision naming `agents`.
#[must_use]
pub fn selection(agents: &[&str]) -> serde_json::Value {
    json!({
        "agentsToUse": agents,
        "reasoning": "picked for the request",
    })
}

/// A place-search intent.
#[must_use]
pub fn context_intent() -> serde_json::Value {
    json!({
        "intent": "find_place",
        "parameters": {"category": "cafe", "location": "18.52,73.85", "radius": 2.0},
        "required_data": ["places", "ratings"],
        "reasoning": "user wants a nearby cafe",
    })
}

/// A valid place data report.
#[must_use]
pub fn place_report() -> serde_json::Value {
    json!({
        "type": "place",
        "data": [{
            "id": "p1",
            "name": "Blue Tokai",
            "location": "18.5310,73.8440",
            "address": "Koregaon Park, Pune",
            "rating": 4.6,
            "category": "cafe",
            "timeToReach": "8 mins",
            "distance": "1.9 km",
        }],
        "conditions": {"temperature": 29.0, "weather": "clear"},
        "meta": {"sources": ["places"], "timestamp": "2026-01-01T10:00:00Z"},
        "reasoning": "one highly rated cafe nearby",
    })
}

/// A place reasoning decision.
#[must_use]
pub fn reasoning_decision() -> serde_json::Value {
    json!({
        "type": "place",
        "data": {
            "decision": {
                "action": "show_places",
                "selected_items": [{
                    "name": "Blue Tokai",
                    "reason": "best rated",
                    "address": {"lat": 18.531, "lng": 73.844},
                }],
            },
            "explanation": "highest rating within walking distance",
        },
    })
}

/// An action report with one marker.
#[must_use]
pub fn action_report() -> serde_json::Value {
    json!({
        "markers": [{
            "id": "m1",
            "position": {"lat": 18.531, "lng": 73.844},
            "label": "Blue Tokai",
        }],
        "routes": [],
        "mapView": {"center": {"lat": 18.531, "lng": 73.844}, "zoom": 15},
        "message": "Showing Blue Tokai",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ActionReport, Contract, ContextIntent, DataReport, ReasoningDecision, SelectionDecision};

    #[test]
    fn test_fixtures_fit_contracts() {
        assert!(SelectionDecision::coerce(selection(&["DataAgent"])).is_ok());
        assert!(ContextIntent::coerce(context_intent()).is_ok());
        assert!(DataReport::coerce(place_report()).is_ok());
        assert!(ReasoningDecision::coerce(reasoning_decision()).is_ok());
        assert!(!ActionReport::coerce(action_report()).unwrap().is_noop());
    }

    #[test]
    fn test_credentials() {
        let set = credentials(3);
        assert_eq!(set.len(), 3);
        assert_eq!(set.candidates()[2].label(), "KEY_3");
        assert!(navigation_request().location.is_some());
    }
}
