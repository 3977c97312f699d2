use crate::error::Result;
use crate::ml::{cosine_similarity, Embedder};
use crate::models::{ActivityType, Coordinates, PlaceRecord, PlanningIntent, RankedPlace, Spot};
use crate::services::catalog::CatalogApi;
use crate::services::geo::GeoApi;
use crate::services::place_cache::PlaceVectorCache;
use futures::future::join_all;
use rand::seq::SliceRandom;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// How many cached candidates survive into the full-record fetch.
const TOP_CACHED_RESULTS: usize = 10;

/// Knobs of the combined ranking metric. Defaults follow the service
/// configuration, not hardcoded business rules.
#[derive(Debug, Clone, Copy)]
pub struct RankingWeights {
    pub similarity_weight: f32,
    pub distance_weight: f32,
    pub max_distance_km: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            similarity_weight: 0.5,
            distance_weight: 0.5,
            max_distance_km: 100.0,
        }
    }
}

/// Weighted blend of semantic similarity and normalized proximity. An
/// unknown distance contributes the neutral score 0.5 instead of either
/// rewarding or punishing the candidate.
pub fn combined_metric(
    similarity: f32,
    distance_km: Option<f64>,
    weights: &RankingWeights,
) -> f32 {
    let distance_score = match distance_km {
        Some(d) => (1.0 - d / weights.max_distance_km).max(0.0) as f32,
        None => 0.5,
    };
    weights.similarity_weight * similarity + weights.distance_weight * distance_score
}

/// The four mutually exclusive retrieval modes, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    ExplicitLocation,
    PreferenceOnly,
    FishingCatalog,
    Fallback,
}

pub fn select_mode(intent: &PlanningIntent, activity: ActivityType) -> SearchMode {
    if !intent.wish_locations.is_empty() {
        SearchMode::ExplicitLocation
    } else if activity != ActivityType::Fishing {
        SearchMode::PreferenceOnly
    } else if !intent.target_fish.is_empty() || !intent.water_types.is_empty() {
        SearchMode::FishingCatalog
    } else {
        SearchMode::Fallback
    }
}

fn name_embedding(place: &PlaceRecord) -> Option<&[f32]> {
    place.name_embedding.as_deref()
}

fn preferences_embedding(place: &PlaceRecord) -> Option<&[f32]> {
    place.preferences_embedding.as_deref()
}

fn sort_by_metric_desc<T>(items: &mut [T], metric: impl Fn(&T) -> f32) {
    // Stable sort: ties keep their retrieval order.
    items.sort_by(|a, b| {
        metric(b)
            .partial_cmp(&metric(a))
            .unwrap_or(Ordering::Equal)
    });
}

fn build_spot(
    record: &PlaceRecord,
    coordinates: Option<Coordinates>,
    distance_km: Option<f64>,
    user_coords: Option<Coordinates>,
) -> Spot {
    Spot {
        name: record.name.clone(),
        coordinates,
        location_user: user_coords,
        description: record.description.clone(),
        distance_km,
    }
}

/// Hybrid ranking over semantic similarity and driving distance.
///
/// One call fans out the independent per-candidate lookups (routes,
/// geocoding, derived embeddings) and fans back in before the sort, so the
/// end-to-end latency is bounded by the slowest candidate rather than the
/// sum. All collaborators sit behind traits and are swapped for mocks in
/// tests.
pub struct RankingPipeline<C, K, G, E> {
    catalog: C,
    cache: K,
    geo: G,
    embedder: E,
    weights: RankingWeights,
}

impl<C, K, G, E> RankingPipeline<C, K, G, E>
where
    C: CatalogApi,
    K: PlaceVectorCache,
    G: GeoApi,
    E: Embedder,
{
    pub fn new(catalog: C, cache: K, geo: G, embedder: E, weights: RankingWeights) -> Self {
        Self {
            catalog,
            cache,
            geo,
            embedder,
            weights,
        }
    }

    /// Produces the ranked, annotated spot list for one analyzed request.
    pub async fn rank(
        &self,
        query: &str,
        intent: &PlanningIntent,
        activity: ActivityType,
    ) -> Result<Vec<Spot>> {
        let mode = select_mode(intent, activity);
        info!("Search mode: {:?}", mode);

        let user_coords = self.resolve_user_coords(intent).await;

        match mode {
            SearchMode::ExplicitLocation => {
                let wish_embedding = self.embedder.embed_semantic(&intent.wish_locations).await;
                self.rank_cached(&wish_embedding, name_embedding, activity, user_coords)
                    .await
            }
            SearchMode::PreferenceOnly => {
                let prefs_embedding = self.user_preferences_embedding(query, intent).await;
                self.rank_cached(&prefs_embedding, preferences_embedding, activity, user_coords)
                    .await
            }
            SearchMode::FishingCatalog => {
                self.rank_fishing_catalog(query, intent, user_coords).await
            }
            SearchMode::Fallback => self.random_sample(activity, user_coords).await,
        }
    }

    /// User coordinates: explicit ones from the intent when present,
    /// otherwise geocoded from the named departure location. Geocoding
    /// failures never fail the request.
    async fn resolve_user_coords(&self, intent: &PlanningIntent) -> Option<Coordinates> {
        if let Some(coords) = intent.user_coordinates {
            return Some(coords);
        }
        let name = intent.departure_location.as_deref()?;
        match self.geo.geocode(name).await {
            Ok(coords) => Some(coords),
            Err(e) => {
                warn!("Could not geocode user location '{}': {}", name, e);
                None
            }
        }
    }

    /// Preference embedding of the user: extracted phrases when the
    /// analyzer found any, otherwise the raw query text.
    async fn user_preferences_embedding(&self, query: &str, intent: &PlanningIntent) -> Vec<f32> {
        if intent.preferences.is_empty() {
            self.embedder.embed_semantic(&[query.to_string()]).await
        } else {
            self.embedder.embed_semantic(&intent.preferences).await
        }
    }

    async fn distance_from(
        &self,
        user: Option<Coordinates>,
        place: Option<Coordinates>,
    ) -> Option<f64> {
        let (from, to) = (user?, place?);
        match self.geo.route_distance(from, to).await {
            Ok(route) => Some(route.distance_km),
            Err(e) => {
                debug!("Route lookup failed: {}", e);
                None
            }
        }
    }

    /// Shared path of the two cached-embedding modes: score every cached
    /// place of the activity against the query embedding, keep the top
    /// slice, then resolve full records for just those ids.
    async fn rank_cached(
        &self,
        query_embedding: &[f32],
        select: for<'a> fn(&'a PlaceRecord) -> Option<&'a [f32]>,
        activity: ActivityType,
        user_coords: Option<Coordinates>,
    ) -> Result<Vec<Spot>> {
        let cached = self.cache.get_all_places(Some(activity)).await?;
        debug!("Scoring {} cached place(s)", cached.len());

        let mut ranked: Vec<RankedPlace> = join_all(cached.iter().map(|place| async move {
            let similarity =
                cosine_similarity(select(place).unwrap_or(&[]), query_embedding);
            let distance_km = self.distance_from(user_coords, place.coordinates).await;
            RankedPlace {
                place_id: place.id,
                similarity,
                distance_km,
                combined_metric: combined_metric(similarity, distance_km, &self.weights),
            }
        }))
        .await;

        sort_by_metric_desc(&mut ranked, |r| r.combined_metric);
        ranked.truncate(TOP_CACHED_RESULTS);

        let ids: Vec<i64> = ranked.iter().map(|r| r.place_id).collect();
        let records = self.catalog.fetch_places_by_ids(&ids).await?;
        let by_id: HashMap<i64, &PlaceRecord> = records.iter().map(|r| (r.id, r)).collect();

        Ok(ranked
            .iter()
            .filter_map(|r| {
                by_id.get(&r.place_id).map(|record| {
                    build_spot(record, record.coordinates, r.distance_km, user_coords)
                })
            })
            .collect())
    }

    /// Fishing search delegated to the catalog, then re-ranked here by
    /// preference similarity and distance. Candidates without any usable
    /// preference signal are dropped; everything else degrades gracefully.
    /// No truncation at this stage.
    async fn rank_fishing_catalog(
        &self,
        query: &str,
        intent: &PlanningIntent,
        user_coords: Option<Coordinates>,
    ) -> Result<Vec<Spot>> {
        let user_prefs = self.user_preferences_embedding(query, intent).await;
        let candidates = self
            .catalog
            .fetch_best_fishing_places(&intent.target_fish, &intent.water_types)
            .await?;
        debug!("Catalog returned {} fishing candidate(s)", candidates.len());

        let user_prefs = &user_prefs;
        let scored = join_all(candidates.into_iter().map(|place| async move {
            let place_embedding = self.candidate_embedding(&place).await?;
            let similarity = cosine_similarity(&place_embedding, user_prefs);

            let place_coords = match place.coordinates {
                Some(coords) => Some(coords),
                None => self.geocode_place(&place.name).await,
            };
            let distance_km = self.distance_from(user_coords, place_coords).await;

            let ranked = RankedPlace {
                place_id: place.id,
                similarity,
                distance_km,
                combined_metric: combined_metric(similarity, distance_km, &self.weights),
            };
            Some((place, place_coords, ranked))
        }))
        .await;

        let mut scored: Vec<(PlaceRecord, Option<Coordinates>, RankedPlace)> =
            scored.into_iter().flatten().collect();
        sort_by_metric_desc(&mut scored, |(_, _, r)| r.combined_metric);

        Ok(scored
            .into_iter()
            .map(|(place, coords, ranked)| {
                build_spot(&place, coords, ranked.distance_km, user_coords)
            })
            .collect())
    }

    /// Preference embedding of one catalog candidate: precomputed vector
    /// first, then derived from listed preferences, then from the free-text
    /// description. `None` means the candidate carries no usable signal.
    async fn candidate_embedding(&self, place: &PlaceRecord) -> Option<Vec<f32>> {
        if let Some(embedding) = &place.preferences_embedding {
            return Some(embedding.clone());
        }
        if !place.preferences.is_empty() {
            return Some(self.embedder.embed_semantic(&place.preferences).await);
        }
        if !place.description.trim().is_empty() {
            return Some(
                self.embedder
                    .embed_semantic(&[place.description.clone()])
                    .await,
            );
        }
        None
    }

    async fn geocode_place(&self, name: &str) -> Option<Coordinates> {
        if name.trim().is_empty() {
            return None;
        }
        match self.geo.geocode(name).await {
            Ok(coords) => Some(coords),
            Err(e) => {
                debug!("Could not geocode place '{}': {}", name, e);
                None
            }
        }
    }

    /// Nothing usable in the intent: a uniform random sample of cached
    /// places with best-effort distances.
    async fn random_sample(
        &self,
        activity: ActivityType,
        user_coords: Option<Coordinates>,
    ) -> Result<Vec<Spot>> {
        let cached = self.cache.get_all_places(Some(activity)).await?;

        let ids: Vec<i64> = {
            let mut rng = rand::thread_rng();
            cached
                .choose_multiple(&mut rng, TOP_CACHED_RESULTS)
                .map(|place| place.id)
                .collect()
        };

        let records = self.catalog.fetch_places_by_ids(&ids).await?;
        let spots = join_all(records.iter().map(|record| async move {
            let distance_km = self.distance_from(user_coords, record.coordinates).await;
            build_spot(record, record.coordinates, distance_km, user_coords)
        }))
        .await;
        Ok(spots)
    }
}
