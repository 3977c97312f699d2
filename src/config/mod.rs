use anyhow::{Context, Result};
use dotenv::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub catalog_base_url: String,
    pub redis_url: String,
    pub huggingface_api_key: String,
    pub osrm_base_url: String,
    pub nominatim_base_url: String,
    pub openrouter_api_key: Option<String>,
    pub caila_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub similarity_weight: f32,
    pub distance_weight: f32,
    pub max_distance_km: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            catalog_base_url: env::var("CATALOG_BASE_URL")
                .context("CATALOG_BASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            huggingface_api_key: env::var("HUGGINGFACE_API_KEY")
                .context("HUGGINGFACE_API_KEY must be set")?,
            osrm_base_url: env::var("OSRM_BASE_URL")
                .unwrap_or_else(|_| "http://router.project-osrm.org".to_string()),
            nominatim_base_url: env::var("NOMINATIM_BASE_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string()),
            openrouter_api_key: env::var("OPENROUTER_API_KEY").ok(),
            caila_api_key: env::var("CAILA_API_KEY").ok(),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            similarity_weight: parse_or("SIMILARITY_WEIGHT", 0.5),
            distance_weight: parse_or("DISTANCE_WEIGHT", 0.5),
            max_distance_km: parse_or("MAX_DISTANCE_KM", 100.0),
        })
    }
}

fn parse_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
