use hdrhistogram::Histogram;
use serde::Serialize;

/// Microsecond quantiles of one duration series. The fixed Prometheus
/// buckets are too coarse to answer "what is p99 right now", so every series
/// keeps an HdrHistogram next to them and the JSON snapshot reports this.
///
/// A series with no samples reports all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyPercentiles {
    pub samples: u64,
    pub min_us: u64,
    pub mean_us: f64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub p999_us: u64,
    pub max_us: u64,
}

impl From<&Histogram<u64>> for LatencyPercentiles {
    fn from(hist: &Histogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::default();
        }

        let quantile = |q: f64| hist.value_at_quantile(q);
        Self {
            samples: hist.len(),
            min_us: hist.min(),
            mean_us: hist.mean(),
            p50_us: quantile(0.50),
            p95_us: quantile(0.95),
            p99_us: quantile(0.99),
            p999_us: quantile(0.999),
            max_us: hist.max(),
        }
    }
}
