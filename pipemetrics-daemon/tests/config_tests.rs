//! Configuration loading tests.
//!
//! Covers the daemon's precedence chain: file < environment < CLI.

use std::io::Write;

use clap::Parser;
use pipemetrics_core::config::PipemetricsConfig;
use pipemetrics_daemon::cli::DaemonCli;
use serial_test::serial;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("failed to write config");
    file
}

#[test]
fn test_parse_full_config() {
    // Given: A complete TOML config
    let toml_str = r#"
[general]
log_level = "debug"
log_format = "pretty"

[fifo]
path = "/run/nginx/access.fifo"
create = false
keepalive_writer = true

[session]
labels = ["status", "hostname"]
max_hostnames = 250
hostname_rollup = false
geo_hash = true
geo_hash_precision = 4

[metrics]
enabled = true
listen_addr = "127.0.0.1"
port = 9100
endpoint = "/prom"
"#;

    // When: Parsing config
    let config = PipemetricsConfig::parse(toml_str).expect("config should parse");

    // Then: Every section is read
    config.validate().expect("config should validate");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.fifo.path, "/run/nginx/access.fifo");
    assert!(config.fifo.keepalive_writer);
    assert_eq!(config.session.labels, vec!["status", "hostname"]);
    assert_eq!(config.session.max_hostnames, 250);
    assert!(!config.session.hostname_rollup);
    assert_eq!(config.session.geo_hash_precision, 4);
    assert_eq!(config.metrics.port, 9100);
    assert_eq!(config.metrics.endpoint, "/prom");
}

#[test]
fn test_config_roundtrips_through_toml() {
    let config = PipemetricsConfig::default();
    let text = toml::to_string(&config).expect("config should serialize");
    let parsed = PipemetricsConfig::parse(&text).expect("serialized config should parse");
    assert_eq!(parsed, config);
}

#[tokio::test]
#[serial]
async fn test_cli_overrides_env_and_file() {
    // Given: file sets port 9100, env sets port 9200 and max_hostnames 10
    let file = write_config("[metrics]\nport = 9100\n");
    // SAFETY: serialized test, no other thread reads the environment
    unsafe {
        std::env::set_var("PIPEMETRICS_METRICS_PORT", "9200");
        std::env::set_var("PIPEMETRICS_SESSION_MAX_HOSTNAMES", "10");
    }

    let cli = DaemonCli::parse_from(["pipemetrics-daemon", "--port", "9300"]);

    // When: applying the same chain as main
    let mut config = PipemetricsConfig::from_file(file.path())
        .await
        .expect("file should load");
    assert_eq!(config.metrics.port, 9100);
    config.apply_env_overrides();
    cli.apply_overrides(&mut config);

    // SAFETY: serialized test
    unsafe {
        std::env::remove_var("PIPEMETRICS_METRICS_PORT");
        std::env::remove_var("PIPEMETRICS_SESSION_MAX_HOSTNAMES");
    }

    // Then: CLI wins for port, env wins for max_hostnames
    assert_eq!(config.metrics.port, 9300);
    assert_eq!(config.session.max_hostnames, 10);
    config.validate().expect("config should validate");
}

#[test]
fn test_cli_can_produce_invalid_config() {
    let cli = DaemonCli::parse_from(["pipemetrics-daemon", "--endpoint", "metrics"]);
    let mut config = PipemetricsConfig::default();
    cli.apply_overrides(&mut config);
    assert!(config.validate().is_err());
}

#[tokio::test]
async fn test_missing_config_file() {
    let err = PipemetricsConfig::from_file("/nonexistent/pipemetrics.toml")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");
}
