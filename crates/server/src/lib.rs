//! Process host for the marketplace fulfillment workflows.
//!
//! Wires configuration, store selection, structured logging (tracing) and
//! Prometheus metrics around a [`Marketplace`]. Only operational endpoints
//! are served: `/health` and `/metrics`.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use fulfillment::{Marketplace, TracingNotifier};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Creates the Axum router over a shared marketplace.
pub fn create_app<S: Store>(market: Arc<Marketplace<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .with_state(market)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the marketplace for `store` with log-only notifications.
pub fn create_marketplace<S: Store>(store: S, config: &Config) -> Arc<Marketplace<S>> {
    Arc::new(Marketplace::new(
        store,
        Arc::new(TracingNotifier),
        config.fulfillment.clone(),
    ))
}
