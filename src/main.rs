use anyhow::Context;
use clap::Parser;
use http_meter::middleware::{ClientInstrumentor, InstrumentedHandler, ServerInstrumentor};
use http_meter::{Direction, MetricSink};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod handlers;
mod server;

use config::Config;
use handlers::vendor::VendorProxy;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Inbound traffic: matched routes and proxied requests alike.
    pub server_metrics: Arc<MetricSink>,

    /// Outbound calls to the vendor.
    pub client_metrics: Arc<MetricSink>,

    /// Reports inbound requests that never reach a wrapped handler.
    pub instrumentor: ServerInstrumentor,

    /// Fallback handler, already wrapped by the server instrumentor.
    pub proxy: InstrumentedHandler<VendorProxy>,

    pub vendor: String,
    pub vendor_url: Url,

    /// Period of the SSE snapshot stream.
    pub stream_interval: Duration,
}

impl AppState {
    /// Build both sinks and the instrumented vendor client.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        // ── 1. Sinks ─────────────────────────────────────────────
        let server_metrics = Arc::new(
            MetricSink::builder(Direction::Server)
                .namespace(config.namespace.clone())
                .build()
                .context("building server metric sink")?,
        );
        let client_metrics = Arc::new(
            MetricSink::builder(Direction::Client)
                .build()
                .context("building client metric sink")?,
        );

        // ── 2. Instrumented vendor client ────────────────────────
        let http = reqwest::Client::builder()
            .timeout(config.vendor_timeout())
            .build()
            .context("building vendor http client")?;
        let transport =
            ClientInstrumentor::new(&config.vendor, client_metrics.clone()).wrap(http);

        let instrumentor = ServerInstrumentor::new(server_metrics.clone());
        let proxy = instrumentor.wrap(VendorProxy::new(config.vendor_url.clone(), transport));

        Ok(Self {
            server_metrics,
            client_metrics,
            instrumentor,
            proxy,
            vendor: config.vendor.clone(),
            vendor_url: config.vendor_url.clone(),
            stream_interval: config.stream_interval(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state = Arc::new(AppState::from_config(&config)?);

    // ── 3. Bind & serve ──────────────────────────────────────────
    let app = server::create_router(state);
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;

    tracing::info!(
        listen = %config.listen,
        vendor = %config.vendor,
        vendor_url = %config.vendor_url,
        "gateway listening"
    );

    axum::serve(listener, app)
        .await
        .context("server exited with error")?;
    Ok(())
}
