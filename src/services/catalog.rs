use crate::error::{ApiError, Result};
use crate::models::{ActivityType, PlaceRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const CATALOG_TIMEOUT_SECS: u64 = 10;

/// Read seam over the backend catalog, the source of truth for place
/// records. Any transport failure or non-2xx answer surfaces as
/// `CatalogUnavailable` and aborts the current pipeline run.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn fetch_places_by_ids(&self, ids: &[i64]) -> Result<Vec<PlaceRecord>>;

    async fn fetch_places_by_type(&self, activity: ActivityType) -> Result<Vec<PlaceRecord>>;

    async fn fetch_best_fishing_places(
        &self,
        target_fish: &[String],
        water_types: &[String],
    ) -> Result<Vec<PlaceRecord>>;
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(CATALOG_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_for_places(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<Vec<PlaceRecord>> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Catalog request: POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::CatalogUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::CatalogUnavailable(format!(
                "catalog returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::CatalogUnavailable(format!("malformed catalog response: {}", e)))
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn fetch_places_by_ids(&self, ids: &[i64]) -> Result<Vec<PlaceRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.post_for_places("/api/places/by-ids", json!({ "ids": ids }))
            .await
    }

    async fn fetch_places_by_type(&self, activity: ActivityType) -> Result<Vec<PlaceRecord>> {
        self.post_for_places("/api/places/by-type", json!({ "activity_type": activity }))
            .await
    }

    async fn fetch_best_fishing_places(
        &self,
        target_fish: &[String],
        water_types: &[String],
    ) -> Result<Vec<PlaceRecord>> {
        self.post_for_places(
            "/api/fishing-places/best",
            json!({ "target_fish": target_fish, "water_space": water_types }),
        )
        .await
    }
}
