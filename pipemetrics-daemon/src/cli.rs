//! CLI argument definitions for pipemetrics-daemon.
//!
//! Every override takes precedence over both the config file and the
//! `PIPEMETRICS_*` environment variables.

use std::path::PathBuf;

use clap::Parser;

use pipemetrics_core::config::PipemetricsConfig;

/// Access-log FIFO reader that exports request counters to Prometheus.
///
/// Lines written to the FIFO are echoed verbatim to stdout; diagnostics go
/// to stderr.
#[derive(Parser, Debug, Default)]
#[command(name = "pipemetrics-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to a pipemetrics.toml configuration file.
    ///
    /// Without it the built-in defaults plus environment overrides are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the FIFO path.
    #[arg(long)]
    pub fifo: Option<PathBuf>,

    /// Open an existing FIFO instead of recreating it at startup.
    #[arg(long)]
    pub no_create_fifo: bool,

    /// Override the label fields (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub labels: Option<Vec<String>>,

    /// Override the maximum number of distinct hostnames.
    #[arg(long)]
    pub max_hostnames: Option<usize>,

    /// Keep hostname in the general counters instead of separate rollups.
    #[arg(long)]
    pub no_hostname_rollup: bool,

    /// Enable the geo_hash label with the given precision (1-12).
    #[arg(long)]
    pub geo_hash_precision: Option<usize>,

    /// Override the metrics listen port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Override the metrics endpoint path.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut PipemetricsConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(fifo) = &self.fifo {
            config.fifo.path = fifo.display().to_string();
        }
        if self.no_create_fifo {
            config.fifo.create = false;
        }
        if let Some(labels) = &self.labels {
            config.session.labels = labels
                .iter()
                .map(|l| l.trim().to_owned())
                .filter(|l| !l.is_empty())
                .collect();
        }
        if let Some(max) = self.max_hostnames {
            config.session.max_hostnames = max;
        }
        if self.no_hostname_rollup {
            config.session.hostname_rollup = false;
        }
        if let Some(precision) = self.geo_hash_precision {
            config.session.geo_hash = true;
            config.session.geo_hash_precision = precision;
        }
        if let Some(port) = self.port {
            config.metrics.port = port;
        }
        if let Some(endpoint) = &self.endpoint {
            config.metrics.endpoint = endpoint.clone();
        }
    }
}
