//! Daemon orchestration -- pipeline assembly, exposition server and shutdown.
//!
//! The [`Orchestrator`] owns the [`MetricsPipeline`] and the daemon-wide
//! [`CancellationToken`]. `run()` returns when one of these happens:
//!
//! 1. `SIGTERM` / `SIGINT` -> clean shutdown, `Ok`
//! 2. the shutdown token is cancelled -> clean shutdown, `Ok`
//! 3. the ingestion task dies (FIFO reopen/read or passthrough failure) -> `Err`,
//!    which `main` turns into a non-zero exit status

use anyhow::{Result, anyhow};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::io::AsyncWrite;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pipemetrics_core::config::PipemetricsConfig;
use pipemetrics_core::pipeline::Pipeline;
use pipemetrics_log_metrics::{MetricsPipeline, MetricsPipelineBuilder, PipelineConfig};

use crate::metrics_server;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: PipemetricsConfig,
    /// FIFO ingestion pipeline.
    pipeline: MetricsPipeline,
    /// Daemon-wide shutdown token (parent of the pipeline's token).
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Build from an already-loaded configuration, writing the passthrough
    /// copy to stdout and diagnostics to stderr.
    pub fn build_from_config(config: PipemetricsConfig) -> Result<Self> {
        Self::build_with_outputs(config, tokio::io::stdout(), tokio::io::stderr())
    }

    /// Build with explicit passthrough and diagnostic writers.
    pub fn build_with_outputs(
        config: PipemetricsConfig,
        passthrough: impl AsyncWrite + Send + Unpin + 'static,
        diagnostics: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow!("config validation failed: {e}"))?;

        let cancel = CancellationToken::new();
        let pipeline = MetricsPipelineBuilder::new()
            .config(PipelineConfig::from_core(&config))
            .passthrough(passthrough)
            .diagnostics(diagnostics)
            .cancel_token(cancel.clone())
            .build()
            .map_err(|e| anyhow!("failed to build metrics pipeline: {e}"))?;

        tracing::info!(
            fifo = %config.fifo.path,
            labels = ?config.session.labels,
            metrics_enabled = config.metrics.enabled,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            pipeline,
            cancel,
        })
    }

    /// Start ingestion and the exposition server, then wait for shutdown.
    pub async fn run(&mut self) -> Result<()> {
        let server = if self.config.metrics.enabled {
            let listener = metrics_server::bind(&self.config.metrics).await?;
            let app = metrics_server::router(&self.config.metrics.endpoint, self.pipeline.handle());
            Some(tokio::spawn(metrics_server::serve(
                listener,
                app,
                self.cancel.clone(),
            )))
        } else {
            None
        };

        if let Err(e) = self.pipeline.start().await {
            self.cancel.cancel();
            join_server(server).await;
            return Err(anyhow!("failed to start metrics pipeline: {e}"));
        }

        tracing::info!("entering main loop");
        let outcome = tokio::select! {
            signal = wait_for_shutdown_signal() => {
                signal.map(|name| tracing::info!(signal = name, "shutdown signal received"))
            }
            _ = self.cancel.cancelled() => {
                tracing::info!("shutdown requested");
                Ok(())
            }
            result = self.pipeline.wait_fatal() => match result {
                Ok(()) => Ok(()),
                Err(e) => {
                    tracing::error!(error = %e, "ingestion failed, shutting down");
                    Err(anyhow!("ingestion failed: {e}"))
                }
            },
        };

        self.shutdown(server).await;
        outcome
    }

    async fn shutdown(&mut self, server: Option<JoinHandle<Result<()>>>) {
        self.cancel.cancel();
        if matches!(self.pipeline.state_name(), "running" | "failed") {
            if let Err(e) = self.pipeline.stop().await {
                tracing::error!(error = %e, "failed to stop metrics pipeline");
            }
        }
        join_server(server).await;
        tracing::info!("pipemetrics-daemon shut down");
    }

    /// Token that stops `run()` when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Handle rendering the current counters.
    pub fn metrics_handle(&self) -> PrometheusHandle {
        self.pipeline.handle()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &PipemetricsConfig {
        &self.config
    }
}

async fn join_server(server: Option<JoinHandle<Result<()>>>) {
    if let Some(task) = server {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "metrics server error"),
            Err(e) => tracing::error!(error = %e, "metrics server task panicked"),
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("failed to install SIGTERM handler: {e}"))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("failed to install SIGINT handler: {e}"))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}
