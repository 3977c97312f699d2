use serde::{Deserialize, Serialize};

use super::Coordinates;

/// What kind of text the analyzer is looking at: a description of a place
/// that already exists, or a user's request for a planned trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    ExistingPlace,
    UserQuery,
}

/// Canonical, schema-typed result of analyzing one message.
///
/// Absent fields are empty vectors or `None`, never sentinel strings; the
/// analyzer guarantees this shape regardless of what the model omitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuredIntent {
    Planning(PlanningIntent),
    ExistingPlace(ExistingPlaceIntent),
}

/// Intent extracted from a trip-planning request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanningIntent {
    pub wish_locations: Vec<String>,
    pub preferences: Vec<String>,
    /// Name of the place the user departs from, when the text gives one;
    /// geocoded into user coordinates by the pipeline.
    pub departure_location: Option<String>,
    pub user_coordinates: Option<Coordinates>,
    pub target_fish: Vec<String>,
    pub water_types: Vec<String>,
    pub budget: Option<f64>,
}

/// Intent extracted from a description of an existing place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExistingPlaceIntent {
    pub place_name: Option<String>,
    pub preferences: Vec<String>,
    pub place_coordinates: Option<Coordinates>,
    pub target_fish: Vec<String>,
    pub water_types: Vec<String>,
    pub budget: Option<f64>,
}

// Raw extraction schemas, one per request kind. Field names match what the
// prompts ask the model to emit; every field is optional so a sparse answer
// still deserializes and normalization fills the gaps.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanningFields {
    #[serde(default)]
    pub wish_location: Option<Vec<String>>,
    #[serde(default)]
    pub user_preferences: Option<Vec<String>>,
    #[serde(default)]
    pub departure_location: Option<String>,
    #[serde(default)]
    pub user_coordinates: Option<Vec<f64>>,
    #[serde(default)]
    pub caught_fishes: Option<Vec<String>>,
    #[serde(default)]
    pub water_space: Option<Vec<String>>,
    #[serde(default)]
    pub wish_price: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExistingPlaceFields {
    #[serde(default)]
    pub name_location: Option<String>,
    #[serde(default)]
    pub user_preferences: Option<Vec<String>>,
    #[serde(default)]
    pub place_coordinates: Option<Vec<f64>>,
    #[serde(default)]
    pub caught_fishes: Option<Vec<String>>,
    #[serde(default)]
    pub water_space: Option<Vec<String>>,
    #[serde(default)]
    pub wish_price: Option<f64>,
}

fn clean_strings(values: Option<Vec<String>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl From<PlanningFields> for PlanningIntent {
    fn from(raw: PlanningFields) -> Self {
        PlanningIntent {
            wish_locations: clean_strings(raw.wish_location),
            preferences: clean_strings(raw.user_preferences),
            departure_location: raw
                .departure_location
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            user_coordinates: raw
                .user_coordinates
                .as_deref()
                .and_then(Coordinates::from_pair),
            target_fish: clean_strings(raw.caught_fishes),
            water_types: clean_strings(raw.water_space),
            budget: raw.wish_price,
        }
    }
}

impl From<ExistingPlaceFields> for ExistingPlaceIntent {
    fn from(raw: ExistingPlaceFields) -> Self {
        ExistingPlaceIntent {
            place_name: raw
                .name_location
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            preferences: clean_strings(raw.user_preferences),
            place_coordinates: raw
                .place_coordinates
                .as_deref()
                .and_then(Coordinates::from_pair),
            target_fish: clean_strings(raw.caught_fishes),
            water_types: clean_strings(raw.water_space),
            budget: raw.wish_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_planning_fields_normalize_to_empty() {
        let raw: PlanningFields = serde_json::from_str("{}").unwrap();
        let intent = PlanningIntent::from(raw);

        assert!(intent.wish_locations.is_empty());
        assert!(intent.preferences.is_empty());
        assert!(intent.user_coordinates.is_none());
        assert!(intent.budget.is_none());
    }

    #[test]
    fn blank_strings_are_dropped_during_normalization() {
        let raw = PlanningFields {
            wish_location: Some(vec!["  ".into(), "Lake Vuoksa".into()]),
            ..Default::default()
        };
        let intent = PlanningIntent::from(raw);

        assert_eq!(intent.wish_locations, vec!["Lake Vuoksa".to_string()]);
    }

    #[test]
    fn malformed_coordinate_pairs_become_none() {
        let raw = ExistingPlaceFields {
            place_coordinates: Some(vec![59.86]),
            ..Default::default()
        };
        let intent = ExistingPlaceIntent::from(raw);
        assert!(intent.place_coordinates.is_none());

        let raw = ExistingPlaceFields {
            place_coordinates: Some(vec![59.86, 30.15]),
            ..Default::default()
        };
        let intent = ExistingPlaceIntent::from(raw);
        assert_eq!(
            intent.place_coordinates,
            Some(Coordinates::new(59.86, 30.15))
        );
    }
}
