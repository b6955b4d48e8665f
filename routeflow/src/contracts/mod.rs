//! Typed stage contracts.
//!
//! Each one-shot stage writes exactly one of these types into the shared
//! state. Reasoning-unit output is validated against them at the stage
//! boundary through [`Contract::coerce`].

mod action;
mod data;
mod intent;
mod reasoning;
mod selection;
mod typed_output;

pub use action::{ActionReport, MapMarker, MapView, RouteRequest, TransportMode};
pub use data::{
    BlockedRoad, Conditions, Coord, DataMeta, DataPayload, DataReport, InfoItem, OtherItem,
    PlaceOption, RouteOption, TrafficData,
};
pub use intent::{ContextIntent, IntentParameters};
pub use reasoning::{
    LatLng, PlaceDecision, PlaceSelection, ReasoningDecision, RouteDecision, RouteSelection,
    SelectedItem,
};
pub use selection::{AgentKind, SelectionDecision};
pub use typed_output::{coerce_value, strip_code_fence, Contract};
