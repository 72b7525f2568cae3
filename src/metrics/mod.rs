pub mod export;
pub mod instruments;
pub mod percentiles;
pub mod sink;

pub use instruments::{HistogramData, LabeledCounter, LabeledHistogram, Schema};
pub use percentiles::LatencyPercentiles;
pub use sink::{
    CounterSample, DurationSample, MetricSink, MetricSinkBuilder, SinkError, SinkSnapshot,
    DURATION_BUCKETS,
};
