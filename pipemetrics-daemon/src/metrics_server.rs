//! Prometheus exposition server.
//!
//! Serves `GET <endpoint>` with the session's rendered counters. Every other
//! path returns 404.
//!
//! # Usage
//!
//! ```ignore
//! let listener = metrics_server::bind(&config.metrics).await?;
//! let app = metrics_server::router(&config.metrics.endpoint, pipeline.handle());
//! tokio::spawn(metrics_server::serve(listener, app, cancel.clone()));
//! ```

use std::net::SocketAddr;

use anyhow::{Result, anyhow};
use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use pipemetrics_core::config::MetricsConfig;

/// Content type of the Prometheus text exposition format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Resolve `listen_addr:port` into a socket address.
///
/// # Errors
///
/// - endpoint does not start with `/`
/// - address does not parse
pub fn listen_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    if !config.endpoint.starts_with('/') {
        return Err(anyhow!(
            "metrics endpoint '{}' must start with '/'",
            config.endpoint
        ));
    }

    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow!("invalid metrics listen address: {e}"))?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces"
        );
    }
    Ok(addr)
}

/// Bind the exposition listener.
pub async fn bind(config: &MetricsConfig) -> Result<TcpListener> {
    let addr = listen_addr(config)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow!("failed to bind metrics listener on {addr}: {e}"))?;
    tracing::info!(
        listen_addr = %listener.local_addr().unwrap_or(addr),
        endpoint = %config.endpoint,
        "metrics endpoint listening"
    );
    Ok(listener)
}

/// Build the exposition router.
pub fn router(endpoint: &str, handle: PrometheusHandle) -> Router {
    Router::new()
        .route(endpoint, get(render_metrics))
        .with_state(handle)
}

/// Serve until `cancel` fires.
pub async fn serve(listener: TcpListener, app: Router, cancel: CancellationToken) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| anyhow!("metrics server failed: {e}"))?;
    tracing::debug!("metrics server stopped");
    Ok(())
}

async fn render_metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        handle.render(),
    )
}
