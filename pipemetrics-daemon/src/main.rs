use anyhow::{Result, anyhow};
use clap::Parser;

use pipemetrics_core::config::PipemetricsConfig;
use pipemetrics_daemon::cli::DaemonCli;
use pipemetrics_daemon::logging;
use pipemetrics_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // file < env < CLI
    let mut config = match &cli.config {
        Some(path) => PipemetricsConfig::from_file(path)
            .await
            .map_err(|e| anyhow!("failed to load config {}: {e}", path.display()))?,
        None => PipemetricsConfig::default(),
    };
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow!("config validation failed: {e}"))?;

    if cli.validate {
        eprintln!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pipemetrics-daemon starting");

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await
}
