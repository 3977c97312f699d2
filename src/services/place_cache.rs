use crate::error::{ApiError, Result};
use crate::models::{ActivityType, PlaceRecord};
use async_trait::async_trait;
use deadpool_redis::{Config as RedisConfig, Pool, Runtime};
use tracing::{info, warn};

const PLACE_KEY_PATTERN: &str = "place:*";
const SCAN_BATCH: usize = 100;

/// Read-only view of the precomputed place embeddings. The ingestion path
/// owns all writes; during ranking this store is only ever scanned.
#[async_trait]
pub trait PlaceVectorCache: Send + Sync {
    /// All cached places, optionally narrowed to one activity. Places
    /// tagged for both activities match either filter.
    async fn get_all_places(&self, activity: Option<ActivityType>) -> Result<Vec<PlaceRecord>>;
}

/// Redis-backed embedding cache. Each place lives under `place:{id}` as a
/// JSON document carrying name/preferences embeddings and coordinates.
#[derive(Clone)]
pub struct RedisPlaceCache {
    pool: Pool,
}

impl RedisPlaceCache {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let cfg = RedisConfig::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ApiError::InternalError(format!("Failed to create Redis pool: {}", e)))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| ApiError::ExternalServiceError(format!("Redis unreachable: {}", e)))?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Place embedding cache connected");

        Ok(Self { pool })
    }

    async fn scan_place_keys(&self) -> Result<Vec<String>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| ApiError::ExternalServiceError(format!("Redis unreachable: {}", e)))?;

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(PLACE_KEY_PATTERN)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }
}

fn matches_activity(record: &PlaceRecord, activity: Option<ActivityType>) -> bool {
    match activity {
        None => true,
        Some(wanted) => {
            record.activity_type == wanted
                || record.activity_type == ActivityType::FishingAndCamping
        }
    }
}

#[async_trait]
impl PlaceVectorCache for RedisPlaceCache {
    async fn get_all_places(&self, activity: Option<ActivityType>) -> Result<Vec<PlaceRecord>> {
        let keys = self.scan_place_keys().await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| ApiError::ExternalServiceError(format!("Redis unreachable: {}", e)))?;

        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        let mut places = Vec::with_capacity(values.len());
        for (key, value) in keys.iter().zip(values) {
            let Some(raw) = value else { continue };
            match serde_json::from_str::<PlaceRecord>(&raw) {
                Ok(record) if matches_activity(&record, activity) => places.push(record),
                Ok(_) => {}
                Err(e) => warn!("Skipping malformed cache entry {}: {}", key, e),
            }
        }
        Ok(places)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(activity: ActivityType) -> PlaceRecord {
        PlaceRecord {
            id: 1,
            name: "spot".into(),
            coordinates: None,
            name_embedding: None,
            preferences_embedding: None,
            preferences: Vec::new(),
            description: String::new(),
            activity_type: activity,
        }
    }

    #[test]
    fn activity_filter_accepts_dual_purpose_places() {
        let fishing = record(ActivityType::Fishing);
        let camping = record(ActivityType::Camping);
        let both = record(ActivityType::FishingAndCamping);

        assert!(matches_activity(&fishing, Some(ActivityType::Fishing)));
        assert!(!matches_activity(&camping, Some(ActivityType::Fishing)));
        assert!(matches_activity(&both, Some(ActivityType::Fishing)));
        assert!(matches_activity(&both, Some(ActivityType::Camping)));
        assert!(matches_activity(&camping, None));
    }

    #[test]
    fn cache_entries_parse_with_embeddings() {
        let raw = r#"{
            "id": 7,
            "name": "Vuoksa bay",
            "coordinates": [60.95, 29.9],
            "name_embedding": [0.1, 0.2],
            "preferences_embedding": [0.3, 0.4],
            "activity_type": "fishing"
        }"#;

        let record: PlaceRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.name_embedding.unwrap(), vec![0.1, 0.2]);
        assert_eq!(record.activity_type, ActivityType::Fishing);
    }
}
