use axum::{middleware as axum_mw, routing::get, Router};
use http_meter::middleware::track_http_metrics;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::AppState;

/// Builds the gateway `Router`.
///
/// Matched routes are measured by the route layer; everything else falls
/// through to the vendor proxy, which carries its own instrumentation.
pub fn create_router(state: Arc<AppState>) -> Router {
    let instrumentor = state.instrumentor.clone();

    Router::new()
        // ── Metrics ─────────────────────────────────────────────
        .route("/metrics", get(handlers::metrics::prometheus))
        .route("/api/metrics", get(handlers::metrics::snapshot))
        .route("/api/metrics/stream", get(handlers::metrics::stream))
        // ── Liveness ────────────────────────────────────────────
        .route("/api/health", get(handlers::health))
        // ── Only runs for matched routes ────────────────────────
        .route_layer(axum_mw::from_fn_with_state(
            instrumentor,
            track_http_metrics,
        ))
        // ── Everything else goes to the vendor ──────────────────
        .fallback(handlers::vendor::forward)
        .with_state(state)
        .layer(CorsLayer::permissive())
}
