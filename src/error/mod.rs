use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No usable model backend configured: {0}")]
    ConfigurationError(String),

    #[error("All model providers unavailable: {0}")]
    AllProvidersUnavailable(String),

    #[error("Model returned output not matching the requested schema: {0}")]
    SchemaViolation(String),

    #[error("Unsupported analysis combination: {0}")]
    UnsupportedCombination(String),

    #[error("Backend catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Route unavailable: {0}")]
    RouteUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let error = ErrorResponse {
            error: self.to_string(),
        };

        match self {
            ApiError::InvalidInput(_) | ApiError::UnsupportedCombination(_) => {
                HttpResponse::BadRequest().json(error)
            }
            ApiError::NotFound(_) => HttpResponse::NotFound().json(error),
            ApiError::AllProvidersUnavailable(_)
            | ApiError::CatalogUnavailable(_)
            | ApiError::RouteUnavailable(_) => HttpResponse::ServiceUnavailable().json(error),
            _ => HttpResponse::InternalServerError().json(error),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::ExternalServiceError(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<redis::RedisError> for ApiError {
    fn from(err: redis::RedisError) -> Self {
        ApiError::ExternalServiceError(err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
