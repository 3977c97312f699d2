use serde::{Deserialize, Serialize};

pub use intent::{
    ExistingPlaceFields, ExistingPlaceIntent, PlanningFields, PlanningIntent, RequestKind,
    StructuredIntent,
};
pub use place::{PlaceRecord, RankedPlace};

pub mod intent;
pub mod place;

/// Activity a place supports. Mirrors the catalog's enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Fishing,
    Camping,
    FishingAndCamping,
}

impl Default for ActivityType {
    fn default() -> Self {
        ActivityType::Fishing
    }
}

/// A latitude/longitude pair. Serialized as `[lat, lon]` on the wire,
/// which is how both the catalog and the extraction schemas carry it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Builds coordinates from a loosely-typed `[lat, lon]` list, rejecting
    /// anything that is not exactly two finite numbers.
    pub fn from_pair(pair: &[f64]) -> Option<Self> {
        match pair {
            [lat, lon] if lat.is_finite() && lon.is_finite() => Some(Self::new(*lat, *lon)),
            _ => None,
        }
    }
}

impl From<[f64; 2]> for Coordinates {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<Coordinates> for [f64; 2] {
    fn from(c: Coordinates) -> Self {
        [c.lat, c.lon]
    }
}

/// Request structure for the primary search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-form description of the trip the user wants
    pub query: String,
    /// Optional activity the search is scoped to; fishing when absent
    #[serde(default)]
    pub activity_type: Option<ActivityType>,
}

/// Request structure for analyzing a description of an existing place
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzePlaceRequest {
    pub message: String,
    #[serde(default)]
    pub activity_type: Option<ActivityType>,
}

/// One recommended place in a search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spot {
    pub name: String,
    pub coordinates: Option<Coordinates>,
    /// Resolved departure point of the user, when geocoding succeeded
    pub location_user: Option<Coordinates>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// Response structure for the primary search endpoint. Always well-formed:
/// total failure is `success = false` plus a message, never a raw fault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    pub spots: Vec<Spot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SearchResponse {
    pub fn ok(spots: Vec<Spot>) -> Self {
        Self {
            success: true,
            spots,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            spots: Vec::new(),
            message: Some(message.into()),
        }
    }
}
