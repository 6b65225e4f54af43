//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use fulfillment::Marketplace;
use serde::Serialize;
use store::Store;

use crate::error::ApiError;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health: 200 when the store answers, 503 otherwise.
pub async fn check<S: Store>(
    State(market): State<Arc<Marketplace<S>>>,
) -> Result<Json<HealthResponse>, ApiError> {
    if let Err(err) = market.health().await {
        metrics::counter!("health_checks_failed_total").increment(1);
        return Err(err.into());
    }
    Ok(Json(HealthResponse { status: "ok" }))
}
