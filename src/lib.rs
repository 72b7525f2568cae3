//! HTTP traffic instrumentation for services that are both an API server and
//! a client of third-party APIs.
//!
//! Inbound handlers and outbound transports are wrapped by decorators that
//! time every request, collapse its path into a low-cardinality endpoint
//! template, and record the outcome into label-keyed counters and a
//! duration histogram.
//!
//! ```ignore
//! use std::sync::Arc;
//! use http_meter::{ClientInstrumentor, Direction, MetricSink, ServerInstrumentor};
//!
//! let server_sink = Arc::new(MetricSink::builder(Direction::Server).build()?);
//! let client_sink = Arc::new(MetricSink::builder(Direction::Client).build()?);
//!
//! let handler = ServerInstrumentor::new(server_sink.clone()).wrap(my_handler);
//! let client =
//!     ClientInstrumentor::new("stripe", client_sink.clone()).wrap(reqwest::Client::new());
//!
//! let text = http_meter::metrics::export::render(&[&*server_sink, &*client_sink]);
//! ```

pub mod endpoint;
pub mod labels;
pub mod metrics;
pub mod middleware;
pub mod observation;

pub use labels::LabelSet;
pub use metrics::{MetricSink, SinkError};
pub use middleware::{ClientInstrumentor, ServerInstrumentor};
pub use observation::{Direction, Observation};
