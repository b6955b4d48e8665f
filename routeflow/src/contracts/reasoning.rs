//! The reasoning stage's decision.

use serde::{Deserialize, Serialize};

use super::Contract;

/// Map coordinates in the `lat`/`lng` convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

impl LatLng {
    /// Creates a coordinate pair.
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// The chosen route and its end points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSelection {
    /// Id of the selected route option.
    #[serde(rename = "selected_route")]
    pub selected_route: String,
    /// Start coordinates.
    pub source_coords: LatLng,
    /// Destination coordinates.
    pub destination_coords: LatLng,
}

/// A route decision with its explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    /// The selection.
    pub decision: RouteSelection,
    /// Why.
    pub explanation: String,
}

/// One selected place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedItem {
    /// Place name.
    pub name: String,
    /// Why it was chosen.
    pub reason: String,
    /// Where it is.
    pub address: LatLng,
}

/// The chosen places and what to do with them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSelection {
    /// Suggested action, e.g. "show".
    pub action: String,
    /// Chosen places.
    pub selected_items: Vec<SelectedItem>,
}

/// A place decision with its explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDecision {
    /// The selection.
    pub decision: PlaceSelection,
    /// Why.
    pub explanation: String,
}

/// The reasoning stage's validated output, tagged by `type` with the body under `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ReasoningDecision {
    /// A route was chosen.
    Route(RouteDecision),
    /// Places were chosen.
    Place(PlaceDecision),
}

impl ReasoningDecision {
    /// Returns the explanation regardless of variant.
    #[must_use]
    pub fn explanation(&self) -> &str {
        match self {
            Self::Route(route) => &route.explanation,
            Self::Place(place) => &place.explanation,
        }
    }
}

impl Contract for ReasoningDecision {
    const NAME: &'static str = "reasoning_decision";
}
