//! Errors surfaced by the host process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::{ErrorKind, FulfillmentError};

/// Startup failures.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to install Prometheus recorder: {0}")]
    Metrics(String),

    #[error("store unavailable: {0}")]
    Store(#[from] store::StoreError),

    #[error("startup check failed: {0}")]
    Startup(#[from] FulfillmentError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handler error that maps a workflow failure onto an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub FulfillmentError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict | ErrorKind::InvalidState => StatusCode::CONFLICT,
            ErrorKind::InsufficientStock | ErrorKind::ProductUnavailable => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorKind::NotOwner => StatusCode::FORBIDDEN,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({
            "error": self.0.to_string(),
            "kind": self.0.kind().as_str(),
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError(err)
    }
}
