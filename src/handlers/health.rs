use crate::llm::ModelRegistry;
use actix_web::{get, web, HttpResponse};

#[get("/health")]
pub async fn health_check(registry: web::Data<ModelRegistry>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "providers": registry.provider_status(),
    }))
}
