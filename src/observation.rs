use axum::http::{Method, StatusCode};
use serde::Serialize;
use std::time::Duration;

use crate::endpoint;
use crate::labels::{LabelSet, LABEL_ENDPOINT, LABEL_METHOD, LABEL_VENDOR};

/// Code recorded when a call fails before any HTTP response exists
/// (connection refused, timeout, TLS failure).
pub const TRANSPORT_FAILURE_STATUS: StatusCode = StatusCode::INTERNAL_SERVER_ERROR;

/// Which side of the service an observation was taken on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Inbound request handled by this service.
    Server,
    /// Outbound call to a third-party API.
    Client,
}

impl Direction {
    /// Base label names for this direction, sorted.
    pub fn base_keys(self) -> &'static [&'static str] {
        match self {
            Direction::Server => &[LABEL_ENDPOINT, LABEL_METHOD],
            Direction::Client => &[LABEL_ENDPOINT, LABEL_METHOD, LABEL_VENDOR],
        }
    }
}

/// `true` for statuses in `[200, 400)`. Redirects count as success.
pub fn is_success(status: StatusCode) -> bool {
    (200..400).contains(&status.as_u16())
}

/// Outcome of one request or call, built once it has completed.
#[derive(Debug, Clone)]
pub struct Observation {
    direction: Direction,
    method: Method,
    raw_path: String,
    status: Option<StatusCode>,
    transport_error: bool,
    duration: Duration,
}

impl Observation {
    /// A call that produced an HTTP response.
    pub fn response(
        direction: Direction,
        method: Method,
        raw_path: impl Into<String>,
        status: StatusCode,
        duration: Duration,
    ) -> Self {
        Self {
            direction,
            method,
            raw_path: raw_path.into(),
            status: Some(status),
            transport_error: false,
            duration,
        }
    }

    /// A call that failed before any response was obtained.
    pub fn transport_failure(
        direction: Direction,
        method: Method,
        raw_path: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            direction,
            method,
            raw_path: raw_path.into(),
            status: None,
            transport_error: true,
            duration,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn transport_error(&self) -> bool {
        self.transport_error
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Endpoint template for `raw_path`.
    pub fn endpoint(&self) -> String {
        endpoint::normalize(&self.raw_path)
    }

    /// Base label set: method and endpoint, plus `vendor` for outbound calls.
    pub fn base_labels(&self, vendor: Option<&str>) -> LabelSet {
        match vendor {
            Some(vendor) => LabelSet::client(vendor, self.endpoint(), self.method.as_str()),
            None => LabelSet::server(self.method.as_str(), self.endpoint()),
        }
    }

    /// Value of the `code` label: the response status, or the sentinel.
    pub fn code(&self) -> StatusCode {
        self.status.unwrap_or(TRANSPORT_FAILURE_STATUS)
    }

    pub fn is_success(&self) -> bool {
        !self.transport_error && self.status.is_some_and(is_success)
    }
}
