pub mod metrics;
pub mod vendor;

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

// ─── GET /api/health ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub vendor: String,
    pub vendor_url: String,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        status: "ok",
        vendor: state.vendor.clone(),
        vendor_url: state.vendor_url.to_string(),
    })
}
