use clap::Parser;
use reqwest::Url;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Gateway settings. Every flag can also come from the environment.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "http-meter",
    version,
    about = "Instrumented gateway in front of a third-party HTTP API"
)]
pub struct Config {
    /// Address the gateway listens on
    #[arg(long, env = "HTTP_METER_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Vendor name used as the `vendor` label on outbound metrics
    #[arg(long, env = "HTTP_METER_VENDOR", default_value = "upstream")]
    pub vendor: String,

    /// Base URL unmatched requests are forwarded to
    #[arg(long, env = "HTTP_METER_VENDOR_URL", default_value = "http://127.0.0.1:8080/")]
    pub vendor_url: Url,

    /// Timeout for one outbound vendor call, in seconds
    #[arg(long, env = "HTTP_METER_VENDOR_TIMEOUT_SECS", default_value_t = 10)]
    pub vendor_timeout_secs: u64,

    /// Namespace of the inbound metric names
    #[arg(long, env = "HTTP_METER_NAMESPACE", default_value = "api")]
    pub namespace: String,

    /// Interval between SSE metric snapshots, in milliseconds
    #[arg(long, env = "HTTP_METER_STREAM_INTERVAL_MS", default_value_t = 500)]
    pub stream_interval_ms: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "HTTP_METER_LOG", default_value = "info,http_meter=debug")]
    pub log_filter: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("vendor name must not be empty")]
    EmptyVendor,

    #[error("vendor url must use http or https, got `{0}`")]
    UnsupportedScheme(String),

    #[error("vendor url `{0}` cannot be used as a base url")]
    NotABase(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("stream interval must be at least {min} ms, got {got}")]
    StreamIntervalTooShort { min: u64, got: u64 },
}

const MIN_STREAM_INTERVAL_MS: u64 = 50;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vendor.trim().is_empty() {
            return Err(ConfigError::EmptyVendor);
        }
        match self.vendor_url.scheme() {
            "http" | "https" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
        if self.vendor_url.cannot_be_a_base() {
            return Err(ConfigError::NotABase(self.vendor_url.to_string()));
        }
        if self.vendor_timeout_secs == 0 {
            return Err(ConfigError::Zero("vendor timeout"));
        }
        if self.stream_interval_ms < MIN_STREAM_INTERVAL_MS {
            return Err(ConfigError::StreamIntervalTooShort {
                min: MIN_STREAM_INTERVAL_MS,
                got: self.stream_interval_ms,
            });
        }
        Ok(())
    }

    pub fn vendor_timeout(&self) -> Duration {
        Duration::from_secs(self.vendor_timeout_secs)
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::parse_from(std::iter::once("http-meter").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = parse(&[]);
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.vendor, "upstream");
        assert_eq!(config.stream_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_rejects_empty_vendor() {
        let config = parse(&["--vendor", " "]);
        assert_eq!(config.validate(), Err(ConfigError::EmptyVendor));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let config = parse(&["--vendor-url", "ftp://files.example.com/"]);
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnsupportedScheme("ftp".into()))
        );
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = parse(&["--vendor-timeout-secs", "0"]);
        assert_eq!(config.validate(), Err(ConfigError::Zero("vendor timeout")));
    }

    #[test]
    fn test_rejects_short_stream_interval() {
        let config = parse(&["--stream-interval-ms", "10"]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::StreamIntervalTooShort { got: 10, .. })
        ));
    }
}
