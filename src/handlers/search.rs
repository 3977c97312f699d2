use crate::{
    error::ApiError,
    models::{AnalyzePlaceRequest, SearchRequest, SearchResponse},
    services::{QueryAnalyzer, SpotRanking},
};
use actix_web::{
    web::{self, Json},
    HttpResponse,
};
use std::time::Duration;
use tracing::error;

/// Whole analyze + rank sequence must finish within this window; on
/// timeout the request fails as a unit and the caller retries from
/// scratch. No partial results are kept.
const SEARCH_TIMEOUT_SECS: u64 = 30;

pub fn search_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/search").route(web::post().to(search)))
        .service(web::resource("/analyze-place").route(web::post().to(analyze_place)));
}

/// Primary facade: free text in, ranked spots out. Every outcome is a
/// well-formed response object; internal failures become `success = false`
/// with a readable message, never a leaked fault.
pub async fn search(
    request: Json<SearchRequest>,
    analyzer: web::Data<QueryAnalyzer>,
    pipeline: web::Data<SpotRanking>,
) -> HttpResponse {
    let query = request.query.trim();
    if query.is_empty() {
        return HttpResponse::Ok().json(SearchResponse::failed("Query cannot be empty"));
    }

    let activity = request.activity_type.unwrap_or_default();

    let outcome = tokio::time::timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS), async {
        let intent = analyzer.analyze_user_query(query, activity).await?;
        pipeline.rank(query, &intent, activity).await
    })
    .await;

    match outcome {
        Ok(Ok(spots)) => HttpResponse::Ok().json(SearchResponse::ok(spots)),
        Ok(Err(e)) => {
            error!("Search failed: {}", e);
            HttpResponse::Ok().json(SearchResponse::failed(user_message(&e)))
        }
        Err(_) => {
            error!("Search timed out after {}s", SEARCH_TIMEOUT_SECS);
            HttpResponse::Ok().json(SearchResponse::failed(
                "Search took too long, please try again",
            ))
        }
    }
}

/// Analyzes a description of an existing place into its structured fields.
/// Used by the ingestion side before a place enters the catalog.
pub async fn analyze_place(
    request: Json<AnalyzePlaceRequest>,
    analyzer: web::Data<QueryAnalyzer>,
) -> Result<HttpResponse, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::InvalidInput("Message cannot be empty".to_string()));
    }

    let activity = request.activity_type.unwrap_or_default();
    let intent = analyzer.analyze_existing_place(message, activity).await?;
    Ok(HttpResponse::Ok().json(intent))
}

fn user_message(error: &ApiError) -> &'static str {
    match error {
        ApiError::AllProvidersUnavailable(_) => {
            "The assistant is overloaded right now, please try again in a minute"
        }
        ApiError::CatalogUnavailable(_) => "The place catalog is temporarily unavailable",
        ApiError::UnsupportedCombination(_) => "This activity type is not supported for search",
        _ => "Search failed, please try again",
    }
}
