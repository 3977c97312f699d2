use crate::error::{ApiError, Result};
use crate::llm::OrchestratedModel;
use crate::models::{
    ActivityType, ExistingPlaceFields, ExistingPlaceIntent, PlanningFields, PlanningIntent,
    RequestKind, StructuredIntent,
};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::debug;

const JSON_RULES: &str = "Respond with a single JSON object containing exactly the fields listed \
above. Use null for a missing value and [] for an empty list. Do not invent anything the text \
does not state. No prose outside the JSON object.";

static CONTEXTS: Lazy<HashMap<(ActivityType, RequestKind), String>> = Lazy::new(|| {
    let mut contexts = HashMap::new();

    contexts.insert(
        (ActivityType::Fishing, RequestKind::UserQuery),
        format!(
            "Extract the details of a planned fishing trip from the user's message:\n\
             - wish_location: places the user wants to go, e.g. [\"Karelian Isthmus\"] or [\"lakes around Leningrad Oblast\"]\n\
             - user_preferences: general wishes, e.g. [\"quiet place\", \"needs parking\", \"deep water\", \"has a pier\", \"overnight allowed\"]\n\
             - departure_location: the named place the user is leaving from (a city or district), e.g. \"Avtovo\"\n\
             - user_coordinates: departure coordinates when the message states them, e.g. [59.861234, 30.154855]\n\
             - caught_fishes: fish the user wants to catch, e.g. [\"pike\", \"perch\"]\n\
             - water_space: kind of water body the user wants, e.g. [\"lake\"] or [\"river\"]\n\
             - wish_price: desired budget if mentioned\n\
             {}",
            JSON_RULES
        ),
    );

    contexts.insert(
        (ActivityType::Fishing, RequestKind::ExistingPlace),
        format!(
            "Extract the details of a fishing spot from the user's description:\n\
             - name_location: name of the spot if given, e.g. \"Lake Vuoksa\" or \"Neva river by the bridge\"\n\
             - user_preferences: REQUIRED, never empty. Pull out every characteristic of the spot \
             that future anglers would care about, as short phrases: fishing conditions (depth, \
             current, bottom, vegetation, snags), infrastructure (pier, gazebos, tent sites, \
             parking, toilets), access (drivable, walking distance), setting (quiet or busy, \
             scenic, sheltered from wind, shade), services (boat or tackle rental, bait, warden), \
             terms (paid or free, overnight allowed, fires allowed), seasonality, and extras \
             (mushrooms, family rest areas, barbecue zones). Report only what the text states, \
             e.g. [\"good access road\", \"quiet place\", \"tents allowed\", \"sandy bottom\"]\n\
             - place_coordinates: coordinates of the spot itself if stated, e.g. [59.861234, 30.154855]\n\
             - caught_fishes: fish caught at this spot, e.g. [\"pike\", \"perch\"]\n\
             - water_space: kind of water body, e.g. [\"lake\"] or [\"river\"]\n\
             - wish_price: cost of fishing here if stated\n\
             {}",
            JSON_RULES
        ),
    );

    contexts.insert(
        (ActivityType::Camping, RequestKind::UserQuery),
        format!(
            "Extract the details of a planned camping trip from the user's message:\n\
             - wish_location: places the user wants to go, e.g. [\"Karelia\"] or [\"Gulf of Finland coast\"]\n\
             - user_preferences: the user's wishes, e.g. [\"needs a shower\", \"fire pit\", \"close to water\", \"quiet place\", \"dog friendly\", \"has a beach\"]\n\
             - departure_location: the named place the user is leaving from, e.g. \"city centre\"\n\
             - user_coordinates: departure coordinates when the message states them\n\
             - wish_price: desired budget if mentioned\n\
             {}",
            JSON_RULES
        ),
    );

    contexts.insert(
        (ActivityType::Camping, RequestKind::ExistingPlace),
        format!(
            "Extract the details of an existing campsite from the description:\n\
             - name_location: name of the campsite, e.g. \"Gentle Shore camping\"\n\
             - user_preferences: REQUIRED, never empty. Pull out every feature future visitors \
             would care about, as short phrases: infrastructure (shower, toilets, electricity, \
             Wi-Fi, parking, gazebos, fire pits, barbecues), location (water nearby, forest, \
             distance from the city, seclusion), amenities (gear rental, shop, cafe, sauna, \
             playground), highlights (views, fishing, berries, beach, swimming), terms (tents or \
             cabins, pets allowed), safety (guarded, lit) and activities. Report only what the \
             text states, e.g. [\"shower and toilets\", \"good water access\", \"equipped fire pits\"]\n\
             - place_coordinates: coordinates of the campsite if stated\n\
             - wish_price: cost of staying if stated\n\
             {}",
            JSON_RULES
        ),
    );

    contexts
});

/// Turns free text into a structured intent through the orchestrated model,
/// with a use-case-specific extraction context per activity and request
/// kind. This layer never invents defaults: when every provider is down the
/// failure propagates to the caller.
#[derive(Clone)]
pub struct QueryAnalyzer {
    model: OrchestratedModel,
}

impl QueryAnalyzer {
    pub fn new(model: OrchestratedModel) -> Self {
        Self { model }
    }

    pub async fn analyze(
        &self,
        text: &str,
        activity: ActivityType,
        kind: RequestKind,
    ) -> Result<StructuredIntent> {
        let context = CONTEXTS.get(&(activity, kind)).ok_or_else(|| {
            ApiError::UnsupportedCombination(format!("{:?} / {:?}", activity, kind))
        })?;

        debug!("Analyzing message for {:?} / {:?}", activity, kind);
        match kind {
            RequestKind::UserQuery => {
                let raw: PlanningFields = self.model.invoke_structured(context, text).await?;
                Ok(StructuredIntent::Planning(raw.into()))
            }
            RequestKind::ExistingPlace => {
                let raw: ExistingPlaceFields = self.model.invoke_structured(context, text).await?;
                Ok(StructuredIntent::ExistingPlace(raw.into()))
            }
        }
    }

    /// Analyzes a user's request for a planned trip.
    pub async fn analyze_user_query(
        &self,
        text: &str,
        activity: ActivityType,
    ) -> Result<PlanningIntent> {
        match self.analyze(text, activity, RequestKind::UserQuery).await? {
            StructuredIntent::Planning(intent) => Ok(intent),
            StructuredIntent::ExistingPlace(_) => Err(ApiError::InternalError(
                "analyzer returned the wrong intent kind".into(),
            )),
        }
    }

    /// Analyzes a description of a place that already exists.
    pub async fn analyze_existing_place(
        &self,
        text: &str,
        activity: ActivityType,
    ) -> Result<ExistingPlaceIntent> {
        match self
            .analyze(text, activity, RequestKind::ExistingPlace)
            .await?
        {
            StructuredIntent::ExistingPlace(intent) => Ok(intent),
            StructuredIntent::Planning(_) => Err(ApiError::InternalError(
                "analyzer returned the wrong intent kind".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, ChatTransport, ModelBackend, ModelRegistry};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedTransport(String);

    #[async_trait]
    impl ChatTransport for FixedTransport {
        async fn complete(&self, _messages: &[ChatMessage], _json_mode: bool) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn analyzer_with_response(json: &str) -> QueryAnalyzer {
        let backend = ModelBackend::new("fixed", 1, Arc::new(FixedTransport(json.to_string())));
        let registry = Arc::new(ModelRegistry::new(vec![backend]).unwrap());
        QueryAnalyzer::new(OrchestratedModel::new(registry))
    }

    #[test]
    fn context_table_covers_the_four_supported_pairs() {
        for activity in [ActivityType::Fishing, ActivityType::Camping] {
            for kind in [RequestKind::UserQuery, RequestKind::ExistingPlace] {
                assert!(CONTEXTS.contains_key(&(activity, kind)));
            }
        }
        assert!(!CONTEXTS.contains_key(&(ActivityType::FishingAndCamping, RequestKind::UserQuery)));
    }

    #[tokio::test]
    async fn combined_activity_is_rejected() {
        let analyzer = analyzer_with_response("{}");
        let result = analyzer
            .analyze("quiet lake", ActivityType::FishingAndCamping, RequestKind::UserQuery)
            .await;
        assert!(matches!(result, Err(ApiError::UnsupportedCombination(_))));
    }

    #[tokio::test]
    async fn planning_extraction_normalizes_into_intent() {
        let analyzer = analyzer_with_response(
            r#"{
                "wish_location": ["Karelian Isthmus"],
                "user_preferences": ["quiet place", "good pier"],
                "departure_location": "Avtovo",
                "caught_fishes": ["pike"],
                "water_space": ["river"],
                "wish_price": 5000
            }"#,
        );

        let intent = analyzer
            .analyze_user_query("I want to catch pike near Avtovo, prefer rivers", ActivityType::Fishing)
            .await
            .unwrap();

        assert_eq!(intent.wish_locations, vec!["Karelian Isthmus"]);
        assert_eq!(intent.departure_location.as_deref(), Some("Avtovo"));
        assert_eq!(intent.target_fish, vec!["pike"]);
        assert_eq!(intent.water_types, vec!["river"]);
        assert_eq!(intent.budget, Some(5000.0));
        assert!(intent.user_coordinates.is_none());
    }

    #[tokio::test]
    async fn sparse_model_answer_still_yields_canonical_shape() {
        let analyzer = analyzer_with_response(r#"{"name_location": "Lake Vuoksa"}"#);

        let intent = analyzer
            .analyze_existing_place("a lake", ActivityType::Fishing)
            .await
            .unwrap();

        assert_eq!(intent.place_name.as_deref(), Some("Lake Vuoksa"));
        assert!(intent.preferences.is_empty());
        assert!(intent.target_fish.is_empty());
        assert!(intent.budget.is_none());
    }
}
