use axum::{
    extract::State,
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use http_meter::metrics::{export, SinkSnapshot};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use crate::AppState;

/// Both sinks, captured back to back.
#[derive(Debug, Serialize)]
pub struct GatewaySnapshot {
    pub server: SinkSnapshot,
    pub client: SinkSnapshot,
}

impl GatewaySnapshot {
    fn capture(state: &AppState) -> Self {
        Self {
            server: state.server_metrics.snapshot(),
            client: state.client_metrics.snapshot(),
        }
    }
}

// ─── GET /metrics ────────────────────────────────────────────────
/// Prometheus scrape target.

pub async fn prometheus(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = export::render(&[&*state.server_metrics, &*state.client_metrics]);
    ([(header::CONTENT_TYPE, export::CONTENT_TYPE)], body)
}

// ─── GET /api/metrics ────────────────────────────────────────────
/// Single JSON snapshot, handy for curl.

pub async fn snapshot(State(state): State<Arc<AppState>>) -> Json<GatewaySnapshot> {
    Json(GatewaySnapshot::capture(&state))
}

// ─── GET /api/metrics/stream ─────────────────────────────────────
/// Server-Sent Events: pushes a full snapshot as JSON every
/// `stream_interval`.

pub async fn stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(state.stream_interval);

    let stream = IntervalStream::new(interval).map(move |_| {
        let event = Event::default()
            .json_data(GatewaySnapshot::capture(&state))
            .unwrap_or_else(|err| {
                tracing::warn!(%err, "failed to encode metrics snapshot");
                Event::default().comment("snapshot unavailable")
            });
        Ok(event)
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
