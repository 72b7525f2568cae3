use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use prometheus::Registry;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::instruments::{LabeledCounter, LabeledHistogram, Schema};
use super::percentiles::LatencyPercentiles;
use crate::labels::{LabelSet, LABEL_CODE};
use crate::observation::{Direction, Observation};

// ─── Configuration ───────────────────────────────────────────────

/// Default duration buckets (seconds): dense below one second, then a long
/// tail so hung calls and client timeouts remain distinguishable.
pub const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

const DEFAULT_SUBSYSTEM: &str = "requests";

/// HdrHistogram range: 1 μs → 1 h, 3 significant figures
const LATENCY_LOW_US: u64 = 1;
const LATENCY_HIGH_US: u64 = 3_600_000_000;
const LATENCY_SIGFIG: u8 = 3;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("invalid metric name component `{0}`")]
    InvalidName(String),

    #[error("at least one duration bucket is required")]
    EmptyBuckets,

    #[error("duration bucket {0} is not a finite non-negative number")]
    InvalidBucket(f64),

    #[error("duration buckets must be strictly increasing (index {index})")]
    UnsortedBuckets { index: usize },

    #[error("latency histogram: {0}")]
    Latency(#[from] hdrhistogram::CreationError),

    #[error("metric registration: {0}")]
    Registry(#[from] prometheus::Error),
}

// ─── Builder ─────────────────────────────────────────────────────

/// Builds a [`MetricSink`] for one direction.
#[derive(Debug, Clone)]
pub struct MetricSinkBuilder {
    direction: Direction,
    namespace: String,
    subsystem: String,
    buckets: Vec<f64>,
}

impl MetricSinkBuilder {
    /// Prefix of every metric name (`<namespace>_<subsystem>_...`).
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    /// Duration bucket upper bounds in seconds, strictly increasing.
    pub fn buckets(mut self, buckets: &[f64]) -> Self {
        self.buckets = buckets.to_vec();
        self
    }

    pub fn build(self) -> Result<MetricSink, SinkError> {
        validate_name(&self.namespace)?;
        validate_name(&self.subsystem)?;
        validate_buckets(&self.buckets)?;

        let latency =
            Histogram::<u64>::new_with_bounds(LATENCY_LOW_US, LATENCY_HIGH_US, LATENCY_SIGFIG)?;

        let prefix = format!("{}_{}", self.namespace, self.subsystem);
        let base = self.direction.base_keys();
        let with_code: Vec<&'static str> =
            base.iter().copied().chain(std::iter::once(LABEL_CODE)).collect();

        let (success_help, failure_help, duration_help) = match self.direction {
            Direction::Server => (
                "Total number of successful API requests",
                "Total number of failed API requests",
                "Duration of API requests",
            ),
            Direction::Client => (
                "Total number of successful vendor API requests",
                "Total number of failed vendor API requests",
                "Duration of vendor API requests",
            ),
        };

        let success = LabeledCounter::new(
            format!("{prefix}_success_total"),
            success_help,
            Schema::new(base),
        )?;
        let failure = LabeledCounter::new(
            format!("{prefix}_failed_total"),
            failure_help,
            Schema::new(&with_code),
        )?;
        let duration = LabeledHistogram::new(
            format!("{prefix}_duration_seconds"),
            duration_help,
            Schema::new(&with_code),
            self.buckets,
            latency,
        )?;

        let registry = Registry::new();
        success.register(&registry)?;
        failure.register(&registry)?;
        duration.register(&registry)?;

        Ok(MetricSink {
            direction: self.direction,
            registry,
            success,
            failure,
            duration,
        })
    }
}

fn validate_name(name: &str) -> Result<(), SinkError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SinkError::InvalidName(name.to_string()))
    }
}

fn validate_buckets(buckets: &[f64]) -> Result<(), SinkError> {
    if buckets.is_empty() {
        return Err(SinkError::EmptyBuckets);
    }
    if let Some(&bad) = buckets.iter().find(|b| !b.is_finite() || **b < 0.0) {
        return Err(SinkError::InvalidBucket(bad));
    }
    if let Some(index) = buckets.windows(2).position(|w| w[0] >= w[1]) {
        return Err(SinkError::UnsortedBuckets { index: index + 1 });
    }
    Ok(())
}

// ─── Sink ────────────────────────────────────────────────────────

/// The three aggregate instruments for one direction.
///
/// Constructed once at startup and shared (`Arc`) with every instrumentor
/// that reports into it. All recording goes through `&self`. The instruments
/// live in a registry owned by the sink, never the process-wide default one.
///
/// Label schemas:
///
/// | Instrument | Labels |
/// |------------|--------|
/// | `*_success_total` | base |
/// | `*_failed_total` | base + `code` |
/// | `*_duration_seconds` | base + `code` |
///
/// where base is `method, endpoint` for [`Direction::Server`] and
/// `vendor, endpoint, method` for [`Direction::Client`]. A label set with any
/// other key set panics.
pub struct MetricSink {
    direction: Direction,
    registry: Registry,
    success: LabeledCounter,
    failure: LabeledCounter,
    duration: LabeledHistogram,
}

impl MetricSink {
    pub fn builder(direction: Direction) -> MetricSinkBuilder {
        let namespace = match direction {
            Direction::Server => "api",
            Direction::Client => "vendor_api",
        };
        MetricSinkBuilder {
            direction,
            namespace: namespace.to_string(),
            subsystem: DEFAULT_SUBSYSTEM.to_string(),
            buckets: DURATION_BUCKETS.to_vec(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn record_success(&self, labels: &LabelSet) {
        self.success.inc(labels);
    }

    pub fn record_failure(&self, labels: &LabelSet) {
        self.failure.inc(labels);
    }

    pub fn observe_duration(&self, labels: &LabelSet, elapsed: Duration) {
        self.duration.observe(labels, elapsed.as_secs_f64());
    }

    /// Record one completed request: exactly one duration sample plus
    /// exactly one success or failure increment.
    ///
    /// Labels are derived from the observation itself; `vendor` is required
    /// by a client sink and must be `None` for a server sink.
    pub fn record(&self, observation: &Observation, vendor: Option<&str>) {
        assert_eq!(
            observation.direction(),
            self.direction,
            "observation reported to a sink of the other direction"
        );
        let base = observation.base_labels(vendor);
        // Validate up front so a bad base set records nothing at all.
        self.success.schema().check(self.success.name(), &base);

        let with_code = base.with_code(observation.code());
        self.observe_duration(&with_code, observation.duration());

        if observation.is_success() {
            self.record_success(&base);
        } else {
            self.record_failure(&with_code);
        }
    }

    pub fn success_total(&self, labels: &LabelSet) -> u64 {
        self.success.get(labels)
    }

    pub fn failure_total(&self, labels: &LabelSet) -> u64 {
        self.failure.get(labels)
    }

    /// Number of duration samples recorded for `labels` (base + `code`).
    pub fn duration_samples(&self, labels: &LabelSet) -> u64 {
        self.duration.count(labels)
    }

    /// Registry holding this sink's three instruments.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn success(&self) -> &LabeledCounter {
        &self.success
    }

    pub(crate) fn failure(&self) -> &LabeledCounter {
        &self.failure
    }

    pub(crate) fn duration(&self) -> &LabeledHistogram {
        &self.duration
    }

    /// Forget every series. Only for test isolation.
    pub fn reset(&self) {
        self.success.reset();
        self.failure.reset();
        self.duration.reset();
    }

    /// Read-only snapshot for the JSON endpoints.
    pub fn snapshot(&self) -> SinkSnapshot {
        let counters = |counter: &LabeledCounter| -> Vec<CounterSample> {
            counter
                .get_all()
                .into_iter()
                .map(|(labels, value)| CounterSample { labels, value })
                .collect()
        };

        SinkSnapshot {
            direction: self.direction,
            captured_at: Utc::now(),
            success: counters(&self.success),
            failure: counters(&self.failure),
            duration: self
                .duration
                .get_all()
                .into_iter()
                .map(|d| DurationSample {
                    labels: d.labels,
                    count: d.count,
                    sum_seconds: d.sum,
                    latency: d.latency,
                })
                .collect(),
        }
    }
}

impl fmt::Debug for MetricSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricSink")
            .field("direction", &self.direction)
            .field("success", &self.success)
            .field("failure", &self.failure)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

// ─── Snapshot types ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CounterSample {
    pub labels: LabelSet,
    pub value: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DurationSample {
    pub labels: LabelSet,
    pub count: u64,
    pub sum_seconds: f64,
    pub latency: LatencyPercentiles,
}

/// Everything one sink has accumulated, at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct SinkSnapshot {
    pub direction: Direction,
    pub captured_at: DateTime<Utc>,
    pub success: Vec<CounterSample>,
    pub failure: Vec<CounterSample>,
    pub duration: Vec<DurationSample>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};
    use std::thread;

    fn server_sink() -> MetricSink {
        MetricSink::builder(Direction::Server).build().unwrap()
    }

    fn ok(path: &str) -> Observation {
        Observation::response(
            Direction::Server,
            Method::GET,
            path,
            StatusCode::OK,
            Duration::from_millis(3),
        )
    }

    #[test]
    fn test_metric_names() {
        let sink = server_sink();
        assert_eq!(sink.success().name(), "api_requests_success_total");
        assert_eq!(sink.failure().name(), "api_requests_failed_total");
        assert_eq!(sink.duration().name(), "api_requests_duration_seconds");

        let client = MetricSink::builder(Direction::Client).build().unwrap();
        assert_eq!(client.success().name(), "vendor_api_requests_success_total");
    }

    #[test]
    fn test_builder_validation() {
        assert!(matches!(
            MetricSink::builder(Direction::Server).namespace("bad-name").build(),
            Err(SinkError::InvalidName(_))
        ));
        assert!(matches!(
            MetricSink::builder(Direction::Server).buckets(&[]).build(),
            Err(SinkError::EmptyBuckets)
        ));
        assert!(matches!(
            MetricSink::builder(Direction::Server).buckets(&[0.1, 0.1]).build(),
            Err(SinkError::UnsortedBuckets { index: 1 })
        ));
        assert!(matches!(
            MetricSink::builder(Direction::Server).buckets(&[0.1, f64::NAN]).build(),
            Err(SinkError::InvalidBucket(_))
        ));
    }

    #[test]
    fn test_record_success() {
        let sink = server_sink();
        let obs = ok("/api/v1/users/12345/profile");
        let base = LabelSet::server("GET", "api/v1/users/<int>/profile");

        sink.record(&obs, None);

        assert_eq!(sink.success_total(&base), 1);
        assert_eq!(sink.duration_samples(&base.with_code(StatusCode::OK)), 1);
        assert!(sink.failure().get_all().is_empty());
    }

    #[test]
    fn test_record_failure() {
        let sink = server_sink();
        let obs = Observation::response(
            Direction::Server,
            Method::GET,
            "/orders/1ca0d4c6-796e-4a1c-a6a0-95fb0f4033b6",
            StatusCode::NOT_FOUND,
            Duration::from_millis(1),
        );
        let base = LabelSet::server("GET", obs.endpoint());
        sink.record(&obs, None);

        let labels = LabelSet::server("GET", "orders/<uuid>").with_code(StatusCode::NOT_FOUND);
        assert_eq!(sink.failure_total(&labels), 1);
        assert_eq!(sink.duration_samples(&labels), 1);
        assert_eq!(sink.success_total(&base), 0);
    }

    #[test]
    #[should_panic(expected = "label schema mismatch")]
    fn test_record_rejects_vendor_on_server_sink() {
        let sink = server_sink();
        sink.record(&ok("/"), Some("acme"));
    }

    #[test]
    fn test_rejected_observation_records_nothing() {
        let sink = server_sink();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            sink.record(&ok("/"), Some("acme"))
        }));

        assert!(outcome.is_err());
        let snapshot = sink.snapshot();
        assert!(snapshot.success.is_empty());
        assert!(snapshot.failure.is_empty());
        assert!(snapshot.duration.is_empty());
    }

    #[test]
    fn test_record_client_observation() {
        let sink = MetricSink::builder(Direction::Client).build().unwrap();
        let obs = Observation::transport_failure(
            Direction::Client,
            Method::POST,
            "/v1/charges/42",
            Duration::from_millis(2),
        );
        sink.record(&obs, Some("stripe"));

        let base = LabelSet::client("stripe", "v1/charges/<int>", "POST");
        assert_eq!(sink.failure_total(&base.with_code(StatusCode::INTERNAL_SERVER_ERROR)), 1);
        assert_eq!(sink.success_total(&base), 0);
    }

    #[test]
    #[should_panic(expected = "label schema mismatch")]
    fn test_success_rejects_code_label() {
        let sink = server_sink();
        sink.record_success(&LabelSet::server("GET", "/").with_code(StatusCode::OK));
    }

    #[test]
    #[should_panic(expected = "other direction")]
    fn test_record_rejects_other_direction() {
        let sink = MetricSink::builder(Direction::Client).build().unwrap();
        sink.record(&ok("/"), Some("acme"));
    }

    #[test]
    fn test_record_concurrent() {
        let sink = server_sink();
        let base = LabelSet::server("GET", "api/v1/users/<int>");

        thread::scope(|scope| {
            for t in 0..8 {
                let sink = &sink;
                scope.spawn(move || {
                    for i in 0..250 {
                        sink.record(&ok(&format!("/api/v1/users/{}", t * 1000 + i)), None);
                    }
                });
            }
        });

        assert_eq!(sink.success_total(&base), 2000);
        assert_eq!(sink.duration_samples(&base.with_code(StatusCode::OK)), 2000);
    }

    #[test]
    fn test_reset() {
        let sink = server_sink();
        let base = LabelSet::server("GET", "/");
        sink.record(&ok("/"), None);
        sink.reset();

        assert_eq!(sink.success_total(&base), 0);
        let snapshot = sink.snapshot();
        assert!(snapshot.success.is_empty());
        assert!(snapshot.duration.is_empty());
    }

    #[test]
    fn test_snapshot_serializes() {
        let sink = server_sink();
        sink.record(&ok("/"), None);

        let json = serde_json::to_value(sink.snapshot()).unwrap();
        assert_eq!(json["direction"], "server");
        assert_eq!(json["success"][0]["labels"]["endpoint"], "/");
        assert_eq!(json["success"][0]["value"], 1);
        assert_eq!(json["duration"][0]["labels"]["code"], "200");
        assert_eq!(json["duration"][0]["latency"]["samples"], 1);
    }
}
