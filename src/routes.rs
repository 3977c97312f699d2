use actix_web::{web, Scope};

use crate::handlers::{health_check, search_config};

/// Configure all routes for the API
pub fn api_routes() -> Scope {
    web::scope("/api")
        .service(health_check)
        .configure(search_config)
}
