use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use forecast_store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("A forecast cycle is already running")]
    CycleInProgress,
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Store(StoreError::NotFound(name)) => {
                (StatusCode::NOT_FOUND, format!("Snapshot '{}' not found", name))
            }
            AppError::Store(store_err) => {
                tracing::error!(error = ?store_err, "Store error.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal storage error occurred".to_string(),
                )
            }
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::CycleInProgress => (
                StatusCode::CONFLICT,
                "A forecast cycle is already running".to_string(),
            ),
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
