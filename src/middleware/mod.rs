//! Instrumentors: decorators that time a wrapped handler or transport and
//! report the outcome to a [`MetricSink`].

pub mod client;
pub mod server;
pub mod timing;

pub use client::{
    ClientInstrumentor, InstrumentedTransport, OutboundRequest, OutboundResponse, Transport,
};
pub use server::{
    BufferedResponse, Handler, InstrumentedHandler, ResponseWriter, ServerInstrumentor,
    StatusRecorder,
};
pub use timing::track_http_metrics;

use std::panic::{self, AssertUnwindSafe};

use crate::metrics::MetricSink;
use crate::observation::Observation;

/// Hand one observation to the sink without letting a sink panic reach the
/// caller. The wrapped call has already completed by now.
fn report(sink: &MetricSink, observation: &Observation, vendor: Option<&str>) {
    let recorded = panic::catch_unwind(AssertUnwindSafe(|| sink.record(observation, vendor)));
    if recorded.is_err() {
        tracing::error!(
            direction = ?observation.direction(),
            method = %observation.method(),
            path = observation.raw_path(),
            "metric sink rejected observation; dropped"
        );
    }
}
