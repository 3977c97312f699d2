use serde::{Deserialize, Serialize};

use super::{ActivityType, Coordinates};

/// A location as the catalog and the embedding cache describe it.
///
/// The catalog owns these records; the ranking pipeline only reads them and
/// annotates copies for the duration of one request. Embeddings are present
/// on cache records and may be absent on freshly-parsed catalog records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences_embedding: Option<Vec<f32>>,
    /// Short characteristic phrases extracted at ingestion time
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub activity_type: ActivityType,
}

/// Per-request scoring result for one candidate place. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPlace {
    pub place_id: i64,
    pub similarity: f32,
    pub distance_km: Option<f64>,
    pub combined_metric: f32,
}
