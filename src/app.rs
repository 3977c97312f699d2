use crate::{
    config::Config,
    error::Result,
    llm::{ModelRegistry, OrchestratedModel},
    ml::RemoteEmbedder,
    routes::api_routes,
    services::{
        CatalogClient, GeoClient, QueryAnalyzer, RankingPipeline, RankingWeights, RedisPlaceCache,
    },
};
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;
use std::net::TcpListener;
use std::sync::Arc;

pub struct Application {
    port: u16,
    host: String,
    config: Config,
}

impl Application {
    /// Create a new application instance
    pub fn new(config: &Config) -> Self {
        Self {
            port: config.port,
            host: config.host.clone(),
            config: config.clone(),
        }
    }

    /// Build and run the server
    pub async fn run(&self) -> Result<()> {
        // Always bind to 0.0.0.0 for Docker compatibility
        let bind_address = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&bind_address)?;
        info!("Starting server at http://{}:{}", self.host, self.port);

        self.run_with_listener(listener).await
    }

    /// Run the server with a specific TCP listener
    /// This is useful for testing where we want to use a random port
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        // Model providers; startup fails here when no credentials exist
        let registry = Arc::new(ModelRegistry::from_config(&self.config)?);
        let registry_data = web::Data::from(registry.clone());
        let analyzer = web::Data::new(QueryAnalyzer::new(OrchestratedModel::new(registry)));

        // External collaborators of the ranking pipeline
        let catalog = CatalogClient::new(&self.config.catalog_base_url)?;
        let cache = RedisPlaceCache::new(&self.config.redis_url).await?;
        let geo = GeoClient::new(&self.config.osrm_base_url, &self.config.nominatim_base_url)?;
        let embedder = RemoteEmbedder::new(&self.config.huggingface_api_key)?;

        let weights = RankingWeights {
            similarity_weight: self.config.similarity_weight,
            distance_weight: self.config.distance_weight,
            max_distance_km: self.config.max_distance_km,
        };
        let pipeline = web::Data::new(RankingPipeline::new(
            catalog, cache, geo, embedder, weights,
        ));

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header();

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .app_data(registry_data.clone())
                .app_data(analyzer.clone())
                .app_data(pipeline.clone())
                .service(api_routes())
        })
        .listen(listener)?
        .run()
        .await?;

        Ok(())
    }
}
