use crate::error::{ApiError, Result};
use crate::models::Coordinates;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const GEO_TIMEOUT_SECS: u64 = 5;
const USER_AGENT: &str = concat!("recommend-a-spot-api/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteInfo {
    pub distance_km: f64,
    pub duration_min: f64,
}

/// Geographic seam: place-name geocoding and driving-route distances.
/// Callers in the ranking pipeline swallow these errors per candidate;
/// nothing here ever aborts a whole batch.
#[async_trait]
pub trait GeoApi: Send + Sync {
    /// Resolves a place name to coordinates. `NotFound` when the geocoder
    /// has no match.
    async fn geocode(&self, name: &str) -> Result<Coordinates>;

    /// Driving distance between two points. `RouteUnavailable` on
    /// transport failure, timeout or an unroutable pair.
    async fn route_distance(&self, from: Coordinates, to: Coordinates) -> Result<RouteInfo>;
}

#[derive(Debug, Deserialize)]
struct GeocodeHit {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// meters
    distance: f64,
    /// seconds
    duration: f64,
}

impl OsrmRoute {
    fn into_info(self) -> RouteInfo {
        RouteInfo {
            distance_km: (self.distance / 1000.0 * 100.0).round() / 100.0,
            duration_min: (self.duration / 60.0).round(),
        }
    }
}

/// Nominatim geocoding + OSRM routing over plain HTTP.
#[derive(Debug, Clone)]
pub struct GeoClient {
    client: Client,
    osrm_base_url: String,
    nominatim_base_url: String,
}

impl GeoClient {
    pub fn new(osrm_base_url: &str, nominatim_base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(GEO_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            osrm_base_url: osrm_base_url.trim_end_matches('/').to_string(),
            nominatim_base_url: nominatim_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GeoApi for GeoClient {
    async fn geocode(&self, name: &str) -> Result<Coordinates> {
        let url = format!("{}/search", self.nominatim_base_url);
        debug!("Geocoding '{}'", name);

        let response = self
            .client
            .get(&url)
            .query(&[("q", name), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| ApiError::ExternalServiceError(format!("Geocoding failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ApiError::ExternalServiceError(format!(
                "Geocoder returned {}",
                response.status()
            )));
        }

        let hits: Vec<GeocodeHit> = response.json().await.map_err(|e| {
            ApiError::SerializationError(format!("Malformed geocoder response: {}", e))
        })?;

        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("no geocoding result for '{}'", name)))?;

        let lat: f64 = hit
            .lat
            .parse()
            .map_err(|_| ApiError::SerializationError("non-numeric latitude".into()))?;
        let lon: f64 = hit
            .lon
            .parse()
            .map_err(|_| ApiError::SerializationError("non-numeric longitude".into()))?;
        Ok(Coordinates::new(lat, lon))
    }

    async fn route_distance(&self, from: Coordinates, to: Coordinates) -> Result<RouteInfo> {
        // OSRM takes lon,lat pairs
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.osrm_base_url, from.lon, from.lat, to.lon, to.lat
        );

        let response = self
            .client
            .get(&url)
            .query(&[("overview", "false")])
            .send()
            .await
            .map_err(|e| ApiError::RouteUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::RouteUnavailable(format!(
                "router returned {}",
                response.status()
            )));
        }

        let body: OsrmResponse = response
            .json()
            .await
            .map_err(|e| ApiError::RouteUnavailable(format!("malformed route response: {}", e)))?;

        if body.code != "Ok" {
            return Err(ApiError::RouteUnavailable(format!(
                "router answered {}",
                body.code
            )));
        }

        body.routes
            .into_iter()
            .next()
            .map(OsrmRoute::into_info)
            .ok_or_else(|| ApiError::RouteUnavailable("no route between points".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn osrm_route_converts_to_km_and_minutes() {
        let body = r#"{
            "code": "Ok",
            "routes": [{"distance": 45678.0, "duration": 2520.0}]
        }"#;

        let parsed: OsrmResponse = serde_json::from_str(body).unwrap();
        let info = parsed.routes.into_iter().next().unwrap().into_info();
        assert_eq!(info.distance_km, 45.68);
        assert_eq!(info.duration_min, 42.0);
    }

    #[test]
    fn osrm_error_body_has_no_routes() {
        let body = r#"{"code": "NoRoute"}"#;
        let parsed: OsrmResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.code, "NoRoute");
        assert!(parsed.routes.is_empty());
    }

    #[test]
    fn geocode_hits_parse_string_coordinates() {
        let body = r#"[{"lat": "59.9311", "lon": "30.3609", "display_name": "Saint Petersburg"}]"#;
        let hits: Vec<GeocodeHit> = serde_json::from_str(body).unwrap();
        assert_eq!(hits[0].lat, "59.9311");
    }
}
