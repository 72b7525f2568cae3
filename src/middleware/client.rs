use axum::http::{Method, Request, Response, StatusCode};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use super::report;
use crate::metrics::MetricSink;
use crate::observation::{Direction, Observation};

// ─── Collaborator traits ─────────────────────────────────────────

/// Read access the instrumentor needs on an outbound request.
pub trait OutboundRequest {
    fn method(&self) -> &Method;

    /// Path component only: no scheme, host or query.
    fn path(&self) -> &str;
}

/// Read access the instrumentor needs on a returned response.
pub trait OutboundResponse {
    fn status(&self) -> StatusCode;
}

/// Anything that turns an outbound request into a response or an error.
pub trait Transport: Send + Sync {
    type Request: OutboundRequest + Send;
    type Response: OutboundResponse + Send;
    type Error: Send;

    fn round_trip(
        &self,
        request: Self::Request,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send;
}

impl<B> OutboundRequest for Request<B> {
    fn method(&self) -> &Method {
        Request::method(self)
    }

    fn path(&self) -> &str {
        self.uri().path()
    }
}

impl<B> OutboundResponse for Response<B> {
    fn status(&self) -> StatusCode {
        Response::status(self)
    }
}

impl OutboundRequest for reqwest::Request {
    fn method(&self) -> &Method {
        reqwest::Request::method(self)
    }

    fn path(&self) -> &str {
        self.url().path()
    }
}

impl OutboundResponse for reqwest::Response {
    fn status(&self) -> StatusCode {
        reqwest::Response::status(self)
    }
}

impl Transport for reqwest::Client {
    type Request = reqwest::Request;
    type Response = reqwest::Response;
    type Error = reqwest::Error;

    fn round_trip(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = Result<reqwest::Response, reqwest::Error>> + Send {
        self.execute(request)
    }
}

// ─── Instrumentor ────────────────────────────────────────────────

/// Reports outbound calls for one vendor to a client-direction sink.
#[derive(Debug, Clone)]
pub struct ClientInstrumentor {
    vendor: Arc<str>,
    sink: Arc<MetricSink>,
}

impl ClientInstrumentor {
    /// Panics if `sink` was built for [`Direction::Server`].
    pub fn new(vendor: &str, sink: Arc<MetricSink>) -> Self {
        assert_eq!(
            sink.direction(),
            Direction::Client,
            "client instrumentor needs a client-direction sink"
        );
        Self {
            vendor: Arc::from(vendor),
            sink,
        }
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn sink(&self) -> &Arc<MetricSink> {
        &self.sink
    }

    /// Decorate `transport`; the result is itself a [`Transport`].
    pub fn wrap<T: Transport>(&self, transport: T) -> InstrumentedTransport<T> {
        InstrumentedTransport {
            inner: transport,
            instrumentor: self.clone(),
        }
    }
}

/// A [`Transport`] that times the wrapped one and records its outcome.
///
/// Responses and errors are handed back exactly as the inner transport
/// returned them.
#[derive(Debug, Clone)]
pub struct InstrumentedTransport<T> {
    inner: T,
    instrumentor: ClientInstrumentor,
}

impl<T> InstrumentedTransport<T> {
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> Transport for InstrumentedTransport<T> {
    type Request = T::Request;
    type Response = T::Response;
    type Error = T::Error;

    async fn round_trip(&self, request: T::Request) -> Result<T::Response, T::Error> {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.path().to_owned();

        let outcome = self.inner.round_trip(request).await;
        let elapsed = start.elapsed();

        let observation = match &outcome {
            Ok(response) => Observation::response(
                Direction::Client,
                method,
                path,
                response.status(),
                elapsed,
            ),
            Err(_) => {
                tracing::debug!(
                    vendor = %self.instrumentor.vendor,
                    %method,
                    path = %path,
                    "outbound call failed before a response"
                );
                Observation::transport_failure(Direction::Client, method, path, elapsed)
            }
        };
        report(&self.instrumentor.sink, &observation, Some(self.instrumentor.vendor()));

        outcome
    }
}
