use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use super::server::ServerInstrumentor;

/// Axum middleware that reports every request to the server sink.
///
/// The response is returned exactly as the inner service produced it.
/// Mount it with `route_layer` so unmatched requests (the fallback) are
/// left to whatever instruments them there:
///
/// ```ignore
/// Router::new()
///     .route("/api/health", get(health))
///     .route_layer(axum::middleware::from_fn_with_state(
///         instrumentor.clone(),
///         track_http_metrics,
///     ))
/// ```
pub async fn track_http_metrics(
    State(instrumentor): State<ServerInstrumentor>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let start = Instant::now();
    let response = next.run(req).await;
    let elapsed = start.elapsed();

    let status = response.status();
    instrumentor.observe(&method, &path, status, elapsed);

    tracing::debug!(
        status = status.as_u16(),
        %method,
        path = %path,
        elapsed_secs = elapsed.as_secs_f64(),
        "request"
    );

    response
}
