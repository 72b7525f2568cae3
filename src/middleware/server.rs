use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::report;
use crate::metrics::MetricSink;
use crate::observation::{Direction, Observation};

// ─── Collaborator traits ─────────────────────────────────────────

/// Where a handler writes its response.
pub trait ResponseWriter: Send {
    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn write_status(&mut self, status: StatusCode);

    fn write_body(&mut self, chunk: &[u8]);
}

/// A unit of request handling: reads the request, writes the response.
pub trait Handler<B>: Send + Sync {
    fn serve(
        &self,
        request: &Request<B>,
        writer: &mut dyn ResponseWriter,
    ) -> impl Future<Output = ()> + Send;
}

// ─── Status capture ──────────────────────────────────────────────

/// Forwards everything to the wrapped writer and remembers the first status
/// written. A body write before any status commits `200 OK`, as in HTTP.
pub struct StatusRecorder<'a> {
    inner: &'a mut dyn ResponseWriter,
    status: Option<StatusCode>,
}

impl<'a> StatusRecorder<'a> {
    pub fn new(inner: &'a mut dyn ResponseWriter) -> Self {
        Self {
            inner,
            status: None,
        }
    }

    /// Status the handler settled on; `200` when it never set one.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }
}

impl ResponseWriter for StatusRecorder<'_> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        self.status.get_or_insert(status);
        self.inner.write_status(status);
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.status.get_or_insert(StatusCode::OK);
        self.inner.write_body(chunk);
    }
}

/// In-memory response, convertible into an axum [`Response`].
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl ResponseWriter for BufferedResponse {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        match self.status {
            None => self.status = Some(status),
            Some(committed) => tracing::warn!(
                %committed,
                ignored = %status,
                "superfluous write_status call"
            ),
        }
    }

    fn write_body(&mut self, chunk: &[u8]) {
        self.status.get_or_insert(StatusCode::OK);
        self.body.extend_from_slice(chunk);
    }
}

impl IntoResponse for BufferedResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }
}

// ─── Instrumentor ────────────────────────────────────────────────

/// Reports inbound requests to a server-direction [`MetricSink`].
#[derive(Debug, Clone)]
pub struct ServerInstrumentor {
    sink: Arc<MetricSink>,
}

impl ServerInstrumentor {
    /// Panics if `sink` was built for [`Direction::Client`].
    pub fn new(sink: Arc<MetricSink>) -> Self {
        assert_eq!(
            sink.direction(),
            Direction::Server,
            "server instrumentor needs a server-direction sink"
        );
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<MetricSink> {
        &self.sink
    }

    /// Decorate `handler`; the result is itself a [`Handler`].
    pub fn wrap<H>(&self, handler: H) -> InstrumentedHandler<H> {
        InstrumentedHandler {
            inner: handler,
            instrumentor: self.clone(),
        }
    }

    /// Report one finished inbound request.
    pub fn observe(&self, method: &Method, path: &str, status: StatusCode, elapsed: Duration) {
        let observation =
            Observation::response(Direction::Server, method.clone(), path, status, elapsed);
        report(&self.sink, &observation, None);
    }
}

/// A [`Handler`] that times the wrapped one and records its outcome.
#[derive(Debug, Clone)]
pub struct InstrumentedHandler<H> {
    inner: H,
    instrumentor: ServerInstrumentor,
}

impl<H> InstrumentedHandler<H> {
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<B, H> Handler<B> for InstrumentedHandler<H>
where
    B: Sync,
    H: Handler<B>,
{
    async fn serve(&self, request: &Request<B>, writer: &mut dyn ResponseWriter) {
        let start = Instant::now();
        let mut recorder = StatusRecorder::new(writer);

        self.inner.serve(request, &mut recorder).await;

        self.instrumentor.observe(
            request.method(),
            request.uri().path(),
            recorder.status(),
            start.elapsed(),
        );
    }
}
