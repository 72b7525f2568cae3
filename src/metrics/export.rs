//! Prometheus text exposition.
//!
//! ```text
//! # HELP api_requests_success_total Total number of successful API requests
//! # TYPE api_requests_success_total counter
//! api_requests_success_total{endpoint="users/<int>",method="GET"} 42
//! # HELP api_requests_duration_seconds Duration of API requests
//! # TYPE api_requests_duration_seconds histogram
//! api_requests_duration_seconds_bucket{code="200",endpoint="users/<int>",method="GET",le="0.1"} 40
//! api_requests_duration_seconds_bucket{code="200",endpoint="users/<int>",method="GET",le="+Inf"} 42
//! api_requests_duration_seconds_sum{code="200",endpoint="users/<int>",method="GET"} 1.37
//! api_requests_duration_seconds_count{code="200",endpoint="users/<int>",method="GET"} 42
//! ```

use prometheus::proto::MetricFamily;
use prometheus::TextEncoder;

use super::sink::MetricSink;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Render every instrument of every sink, in order. Instruments that have
/// not seen a single label set yet are left out.
pub fn render(sinks: &[&MetricSink]) -> String {
    let families: Vec<MetricFamily> = sinks
        .iter()
        .flat_map(|sink| sink.registry().gather())
        .collect();

    TextEncoder::new()
        .encode_to_string(&families)
        .unwrap_or_else(|err| {
            tracing::error!(%err, "failed to encode metrics");
            String::new()
        })
}

impl MetricSink {
    /// This sink alone in Prometheus text format.
    pub fn render_prometheus(&self) -> String {
        render(&[self])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::LabelSet;
    use crate::observation::Direction;
    use axum::http::StatusCode;
    use std::time::Duration;

    #[test]
    fn test_empty_sink_renders_no_series() {
        let sink = MetricSink::builder(Direction::Server).build().unwrap();
        assert!(!sink.render_prometheus().contains("api_requests_"));
    }

    #[test]
    fn test_export_counters() {
        let sink = MetricSink::builder(Direction::Server).build().unwrap();
        let base = LabelSet::server("GET", "users/<int>");
        sink.record_success(&base);
        sink.record_success(&base);
        sink.record_failure(&base.with_code(StatusCode::BAD_GATEWAY));

        let output = sink.render_prometheus();

        assert!(output.contains(
            "# HELP api_requests_success_total Total number of successful API requests"
        ));
        assert!(output.contains("# TYPE api_requests_success_total counter"));
        assert!(output
            .contains(r#"api_requests_success_total{endpoint="users/<int>",method="GET"} 2"#));
        assert!(output.contains(
            r#"api_requests_failed_total{code="502",endpoint="users/<int>",method="GET"} 1"#
        ));
    }

    #[test]
    fn test_export_histogram() {
        let sink = MetricSink::builder(Direction::Client)
            .buckets(&[0.1, 0.5, 1.0])
            .build()
            .unwrap();
        let labels = LabelSet::client("acme", "charges", "POST").with_code(StatusCode::OK);
        sink.observe_duration(&labels, Duration::from_millis(50));
        sink.observe_duration(&labels, Duration::from_millis(300));

        let output = sink.render_prometheus();
        let series = r#"code="200",endpoint="charges",method="POST",vendor="acme""#;

        assert!(output.contains("# TYPE vendor_api_requests_duration_seconds histogram"));
        assert!(output.contains(&format!(
            "vendor_api_requests_duration_seconds_bucket{{{series},le=\"0.1\"}} 1"
        )));
        assert!(output.contains(&format!(
            "vendor_api_requests_duration_seconds_bucket{{{series},le=\"0.5\"}} 2"
        )));
        assert!(output.contains(&format!(
            "vendor_api_requests_duration_seconds_bucket{{{series},le=\"+Inf\"}} 2"
        )));
        assert!(output.contains(&format!(
            "vendor_api_requests_duration_seconds_count{{{series}}} 2"
        )));
    }

    #[test]
    fn test_render_multiple_sinks() {
        let server = MetricSink::builder(Direction::Server).build().unwrap();
        let client = MetricSink::builder(Direction::Client).build().unwrap();
        server.record_success(&LabelSet::server("GET", "/"));
        client.record_success(&LabelSet::client("acme", "/", "GET"));

        let output = render(&[&server, &client]);
        assert!(output.contains("api_requests_success_total{"));
        assert!(output.contains("vendor_api_requests_success_total{"));
    }

    #[test]
    fn test_sinks_do_not_share_a_registry() {
        let first = MetricSink::builder(Direction::Server).build().unwrap();
        let second = MetricSink::builder(Direction::Server).build().unwrap();
        first.record_success(&LabelSet::server("GET", "/"));

        assert!(first.render_prometheus().contains("api_requests_success_total{"));
        assert!(!second.render_prometheus().contains("api_requests_success_total{"));
    }
}
