//! The action stage's map commands.

use serde::{Deserialize, Serialize};

use super::{Contract, LatLng};

/// A marker to place on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    /// Unique id.
    pub id: String,
    /// Where to place it.
    pub position: LatLng,
    /// Short label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Popup text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popup: Option<String>,
}

/// How a route is travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// By car.
    #[default]
    Car,
    /// By bike.
    Bike,
    /// On foot.
    Foot,
}

/// A route to draw between two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    /// Mode of transport.
    #[serde(default)]
    pub mode_of_transportation: TransportMode,
    /// Start.
    pub coord1: LatLng,
    /// End.
    pub coord2: LatLng,
}

fn default_animate() -> bool {
    true
}

/// Where the map should look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    /// Center of the view.
    pub center: LatLng,
    /// Zoom level, 1 to 20.
    pub zoom: u8,
    /// Whether to animate the transition.
    #[serde(default = "default_animate")]
    pub animate: bool,
}

/// The action stage's validated output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionReport {
    /// Markers to show.
    #[serde(default)]
    pub markers: Vec<MapMarker>,
    /// Routes to draw.
    #[serde(default)]
    pub routes: Vec<RouteRequest>,
    /// View change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_view: Option<MapView>,
    /// User-facing note on what was done.
    #[serde(default)]
    pub message: String,
}

impl ActionReport {
    /// Returns true if the report carries no map command.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.markers.is_empty() && self.routes.is_empty() && self.map_view.is_none()
    }
}

impl Contract for ActionReport {
    const NAME: &'static str = "action_report";
}
