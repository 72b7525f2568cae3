use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header::CONTENT_TYPE, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use http_meter::middleware::{
    BufferedResponse, Handler, InstrumentedTransport, ResponseWriter, Transport,
};
use reqwest::Url;
use std::sync::Arc;
use std::time::Instant;

use crate::AppState;

/// Largest request body forwarded to the vendor.
pub const MAX_FORWARD_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Forwards a request to the vendor base URL and copies the reply back.
pub struct VendorProxy {
    base_url: Url,
    transport: InstrumentedTransport<reqwest::Client>,
}

impl VendorProxy {
    /// `base_url` must be usable as a base (checked by config validation).
    pub fn new(base_url: Url, transport: InstrumentedTransport<reqwest::Client>) -> Self {
        Self {
            base_url,
            transport,
        }
    }
}

/// Vendor URL for an inbound request: the request's path segments appended
/// below the base path, with the query carried over.
///
/// Host and scheme always come from `base`. Empty and dot segments
/// (including percent-encoded dots) are dropped so a request can neither
/// leave the base path nor reach another origin.
pub fn target(base: &Url, uri: &Uri) -> Url {
    let mut path = base.path().trim_end_matches('/').to_owned();
    for segment in uri.path().split('/').filter(|s| !is_dot_or_empty(s)) {
        path.push('/');
        path.push_str(segment);
    }
    if path.is_empty() || (uri.path().ends_with('/') && !path.ends_with('/')) {
        path.push('/');
    }

    let mut url = base.clone();
    url.set_path(&path);
    url.set_query(uri.query());
    url
}

fn is_dot_or_empty(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    matches!(decoded.as_str(), "" | "." | "..")
}

impl Handler<Bytes> for VendorProxy {
    async fn serve(&self, request: &axum::http::Request<Bytes>, writer: &mut dyn ResponseWriter) {
        let url = target(&self.base_url, request.uri());

        let mut outbound = reqwest::Request::new(request.method().clone(), url);
        if let Some(content_type) = request.headers().get(CONTENT_TYPE) {
            outbound
                .headers_mut()
                .insert(CONTENT_TYPE, content_type.clone());
        }
        if !request.body().is_empty() {
            *outbound.body_mut() = Some(request.body().clone().into());
        }

        let upstream = match self.transport.round_trip(outbound).await {
            Ok(upstream) => upstream,
            Err(err) => {
                tracing::warn!(%err, "vendor unreachable");
                writer.write_status(StatusCode::BAD_GATEWAY);
                writer.write_body(b"vendor unreachable");
                return;
            }
        };

        writer.write_status(upstream.status());
        if let Some(content_type) = upstream.headers().get(CONTENT_TYPE) {
            writer
                .headers_mut()
                .insert(CONTENT_TYPE, content_type.clone());
        }
        match upstream.bytes().await {
            Ok(body) => writer.write_body(&body),
            Err(err) => tracing::warn!(%err, "vendor body truncated"),
        }
    }
}

// ─── Fallback: every unmatched route ─────────────────────────────

pub async fn forward(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_FORWARD_BODY_BYTES).await {
        Ok(body) => body,
        Err(err) => {
            // Never reaches the wrapped proxy, so report it here.
            let status = StatusCode::PAYLOAD_TOO_LARGE;
            state
                .instrumentor
                .observe(&parts.method, parts.uri.path(), status, start.elapsed());
            tracing::warn!(%err, path = parts.uri.path(), "rejecting request body");
            return (status, "request body too large or unreadable").into_response();
        }
    };
    let request = axum::http::Request::from_parts(parts, body);

    let mut response = BufferedResponse::new();
    state.proxy.serve(&request, &mut response).await;
    response.into_response()
}
