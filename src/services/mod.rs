pub mod analyzer;
pub mod catalog;
pub mod geo;
pub mod place_cache;
pub mod ranking;

// Re-export public types
pub use analyzer::QueryAnalyzer;
pub use catalog::{CatalogApi, CatalogClient};
pub use geo::{GeoApi, GeoClient};
pub use place_cache::{PlaceVectorCache, RedisPlaceCache};
pub use ranking::{combined_metric, RankingPipeline, RankingWeights, SearchMode};

use crate::ml::RemoteEmbedder;

/// The pipeline as wired in production, over the real collaborators.
pub type SpotRanking = RankingPipeline<CatalogClient, RedisPlaceCache, GeoClient, RemoteEmbedder>;
