//! Label-keyed aggregate instruments.
//!
//! Counters and bucketed histograms are `prometheus` vecs; each label set is
//! one child of the vec. Histograms additionally keep an HdrHistogram per
//! series for the percentile view. That map sits behind a read-mostly
//! `RwLock`: the common case (series already exists) only takes the read
//! lock, the write lock is taken once per new series.

use hdrhistogram::Histogram;
use parking_lot::{Mutex, RwLock};
use prometheus::core::Collector;
use prometheus::proto::{LabelPair, Metric};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::collections::HashMap;
use std::fmt;

use super::percentiles::LatencyPercentiles;
use crate::labels::LabelSet;

/// Label names an instrument accepts, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    keys: Vec<&'static str>,
}

impl Schema {
    pub fn new(keys: &[&'static str]) -> Self {
        let mut keys = keys.to_vec();
        keys.sort_unstable();
        keys.dedup();
        Self { keys }
    }

    pub fn keys(&self) -> &[&'static str] {
        &self.keys
    }

    pub fn matches(&self, labels: &LabelSet) -> bool {
        labels.keys().eq(self.keys.iter().copied())
    }

    /// Panics when `labels` does not carry exactly the declared names.
    /// Series with different key sets cannot be merged downstream.
    pub fn check(&self, metric: &str, labels: &LabelSet) {
        if !self.matches(labels) {
            panic!(
                "label schema mismatch on `{metric}`: expected {:?}, got {:?}",
                self.keys,
                labels.keys().collect::<Vec<_>>()
            );
        }
    }

    /// Rebuild a [`LabelSet`] from an exported series.
    fn label_set(&self, pairs: &[LabelPair]) -> LabelSet {
        self.keys
            .iter()
            .filter_map(|&key| {
                pairs
                    .iter()
                    .find(|pair| pair.get_name() == key)
                    .map(|pair| (key, pair.get_value().to_owned()))
            })
            .collect()
    }
}

/// Monotonic counter per label set.
#[derive(Clone)]
pub struct LabeledCounter {
    name: String,
    help: String,
    schema: Schema,
    vec: IntCounterVec,
}

impl LabeledCounter {
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        schema: Schema,
    ) -> prometheus::Result<Self> {
        let (name, help) = (name.into(), help.into());
        let vec = IntCounterVec::new(Opts::new(name.clone(), help.clone()), schema.keys())?;
        Ok(Self {
            name,
            help,
            schema,
            vec,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.vec.clone()))
    }

    pub fn inc(&self, labels: &LabelSet) {
        self.schema.check(&self.name, labels);
        self.vec.with_label_values(&labels.values()).inc();
    }

    /// Current value; `0` for a label set never seen.
    pub fn get(&self, labels: &LabelSet) -> u64 {
        self.get_all()
            .into_iter()
            .find(|(series, _)| series == labels)
            .map_or(0, |(_, value)| value)
    }

    /// All series, ordered by label set.
    pub fn get_all(&self) -> Vec<(LabelSet, u64)> {
        let mut all: Vec<_> = series(&self.vec)
            .iter()
            .map(|metric| {
                (
                    self.schema.label_set(metric.get_label()),
                    metric.get_counter().get_value() as u64,
                )
            })
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Drop every series. Only meant for test isolation.
    pub fn reset(&self) {
        self.vec.reset();
    }
}

/// Fixed-bucket histogram per label set.
///
/// Each series also feeds an HdrHistogram (microsecond resolution) so the
/// JSON snapshot can report percentiles the fixed buckets cannot resolve.
pub struct LabeledHistogram {
    name: String,
    help: String,
    schema: Schema,
    bounds: Vec<f64>,
    vec: HistogramVec,
    latency_template: Histogram<u64>,
    latency: RwLock<HashMap<LabelSet, Mutex<Histogram<u64>>>>,
}

/// Histogram data for a single label set.
#[derive(Debug, Clone)]
pub struct HistogramData {
    pub labels: LabelSet,
    /// Upper bounds, without `+Inf`.
    pub bounds: Vec<f64>,
    /// Cumulative counts, one per bound.
    pub cumulative: Vec<u64>,
    pub sum: f64,
    pub count: u64,
    pub latency: LatencyPercentiles,
}

impl LabeledHistogram {
    /// `bounds` must already be validated as finite and strictly increasing;
    /// `latency_template` is cloned (empty) for every new series.
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        schema: Schema,
        bounds: Vec<f64>,
        latency_template: Histogram<u64>,
    ) -> prometheus::Result<Self> {
        let (name, help) = (name.into(), help.into());
        let opts = HistogramOpts::new(name.clone(), help.clone()).buckets(bounds.clone());
        let vec = HistogramVec::new(opts, schema.keys())?;
        Ok(Self {
            name,
            help,
            schema,
            bounds,
            vec,
            latency_template,
            latency: RwLock::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.vec.clone()))
    }

    /// Add one sample, in seconds.
    pub fn observe(&self, labels: &LabelSet, seconds: f64) {
        self.schema.check(&self.name, labels);
        assert!(
            seconds.is_finite() && seconds >= 0.0,
            "`{}` observed {seconds}; durations must be finite and non-negative",
            self.name
        );

        self.vec.with_label_values(&labels.values()).observe(seconds);

        let micros = ((seconds * 1_000_000.0).round() as u64).max(1);
        {
            let latency = self.latency.read();
            if let Some(hist) = latency.get(labels) {
                hist.lock().saturating_record(micros);
                return;
            }
        }

        self.latency
            .write()
            .entry(labels.clone())
            .or_insert_with(|| Mutex::new(self.latency_template.clone()))
            .get_mut()
            .saturating_record(micros);
    }

    /// Number of samples observed for `labels`.
    pub fn count(&self, labels: &LabelSet) -> u64 {
        self.get_all()
            .into_iter()
            .find(|data| data.labels == *labels)
            .map_or(0, |data| data.count)
    }

    /// All series, ordered by label set.
    pub fn get_all(&self) -> Vec<HistogramData> {
        let latency = self.latency.read();
        let mut all: Vec<HistogramData> = series(&self.vec)
            .iter()
            .map(|metric| {
                let labels = self.schema.label_set(metric.get_label());
                let hist = metric.get_histogram();
                let (bounds, cumulative) = hist
                    .get_bucket()
                    .iter()
                    .map(|b| (b.get_upper_bound(), b.get_cumulative_count()))
                    .unzip();
                let percentiles = latency
                    .get(&labels)
                    .map(|h| LatencyPercentiles::from(&*h.lock()))
                    .unwrap_or_default();
                HistogramData {
                    labels,
                    bounds,
                    cumulative,
                    sum: hist.get_sample_sum(),
                    count: hist.get_sample_count(),
                    latency: percentiles,
                }
            })
            .collect();
        all.sort_by(|a, b| a.labels.cmp(&b.labels));
        all
    }

    /// Drop every series. Only meant for test isolation.
    pub fn reset(&self) {
        self.vec.reset();
        self.latency.write().clear();
    }
}

impl fmt::Debug for LabeledCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabeledCounter")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for LabeledHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabeledHistogram")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

fn series(collector: &impl Collector) -> Vec<Metric> {
    collector
        .collect()
        .into_iter()
        .flat_map(|mut family| family.take_metric().into_vec())
        .collect()
}
