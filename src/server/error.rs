//! Error type shared by every route, rendered as a JSON body.

use crate::catalog_client::CatalogApiError;
use crate::ingestion::IngestionError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    NotFound { resource: String, message: String },

    #[error("Invalid or missing admin key")]
    Unauthorized,

    #[error("Catalog API error: {0}")]
    Upstream(#[from] CatalogApiError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn not_found(resource: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::NotFound {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

impl From<IngestionError> for ApiError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::UnknownMarket(market) => {
                ApiError::Validation(format!("Invalid market '{}'", market))
            }
            IngestionError::Catalog(e) => ApiError::Upstream(e),
            IngestionError::Store(e) => ApiError::Internal(e),
            IngestionError::Task(msg) => ApiError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                json!({"success": false, "error": "validation_error", "message": message}),
            ),
            ApiError::NotFound { resource, message } => (
                StatusCode::NOT_FOUND,
                json!({
                    "success": false,
                    "error": "not_found",
                    "message": message,
                    "resource": resource,
                }),
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({
                    "success": false,
                    "error": "unauthorized",
                    "message": "Invalid or missing admin key",
                }),
            ),
            ApiError::Upstream(e) => {
                warn!("Catalog API error surfaced to caller: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({
                        "success": false,
                        "error": "catalog_api_error",
                        "message": "The music catalog API request failed",
                        "upstream_status": e.status(),
                    }),
                )
            }
            ApiError::Internal(e) => {
                let request_id = uuid::Uuid::new_v4().to_string();
                error!("Internal error (request_id {}): {:#}", request_id, e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "success": false,
                        "error": "internal_error",
                        "message": "An internal error occurred",
                        "request_id": request_id,
                    }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
