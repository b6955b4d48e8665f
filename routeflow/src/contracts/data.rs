//! The data stage's report: a tagged union over four item shapes.

use serde::{Deserialize, Serialize};

use super::Contract;

/// A latitude / longitude pair as emitted by data sources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

/// A road segment reported as blocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedRoad {
    /// Segment start.
    pub from: String,
    /// Segment end.
    pub to: String,
    /// Why it is blocked.
    pub reason: String,
}

/// Live traffic along a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficData {
    /// Blocked segments.
    pub roads_blocked: Vec<BlockedRoad>,
    /// Current speed.
    pub current_speed: f64,
    /// Current travel time.
    pub current_travel_time: f64,
    /// Anything else the source reported.
    #[serde(default)]
    pub misc: serde_json::Value,
}

/// One candidate route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteOption {
    /// Identifier the reasoning stage selects by.
    pub id: String,
    /// Friendly name of the start.
    pub start_place: String,
    /// Start coordinates.
    pub start_coord: Coord,
    /// Friendly name of the destination.
    pub end_place: String,
    /// Destination coordinates.
    pub end_coord: Coord,
    /// Human readable distance.
    pub distance: String,
    /// Human readable duration.
    pub duration: String,
    /// Traffic along the route.
    pub traffic_data: TrafficData,
}

/// One candidate place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOption {
    /// Identifier the reasoning stage selects by.
    pub id: String,
    /// Place name.
    pub name: String,
    /// Location description.
    pub location: String,
    /// Street address.
    pub address: String,
    /// Rating.
    pub rating: f64,
    /// Category.
    pub category: String,
    /// Human readable travel time.
    pub time_to_reach: String,
    /// Human readable distance.
    pub distance: String,
}

/// External information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoItem {
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Where it came from.
    pub source: String,
}

/// Anything else worth passing on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherItem {
    /// Free text.
    pub content: String,
}

/// The discriminated part of a [`DataReport`], tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DataPayload {
    /// Candidate routes.
    Route {
        /// Items.
        data: Vec<RouteOption>,
    },
    /// Candidate places.
    Place {
        /// Items.
        data: Vec<PlaceOption>,
    },
    /// Informational items.
    Info {
        /// Items.
        data: Vec<InfoItem>,
    },
    /// Anything else.
    Other {
        /// Items.
        data: Vec<OtherItem>,
    },
}

impl DataPayload {
    /// Returns the variant tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Route { .. } => "route",
            Self::Place { .. } => "place",
            Self::Info { .. } => "info",
            Self::Other { .. } => "other",
        }
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Route { data } => data.len(),
            Self::Place { data } => data.len(),
            Self::Info { data } => data.len(),
            Self::Other { data } => data.len(),
        }
    }

    /// Returns true if the payload has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ambient conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    /// Temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Active alerts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Vec<String>>,
    /// Weather summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
}

/// Provenance of the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataMeta {
    /// Sources consulted.
    #[serde(default)]
    pub sources: Vec<String>,
    /// When the data was gathered.
    pub timestamp: String,
    /// Confidence in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// The data stage's validated output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataReport {
    /// The tagged items.
    #[serde(flatten)]
    pub payload: DataPayload,
    /// Ambient conditions.
    pub conditions: Conditions,
    /// Provenance.
    pub meta: DataMeta,
    /// Why this data was chosen.
    pub reasoning: String,
}

impl Contract for DataReport {
    const NAME: &'static str = "data_report";
}
