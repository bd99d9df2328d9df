#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use pipemetrics_log_metrics::{MetricsSession, PrometheusSink, SessionConfig};

fuzz_target!(|data: &[u8]| {
    let config = SessionConfig {
        labels: vec![
            "status".to_owned(),
            "content_type".to_owned(),
            "hostname".to_owned(),
            "http_accept_encoding".to_owned(),
        ],
        max_hostnames: 4,
        geo_hash: true,
        geo_hash_precision: 6,
        ..SessionConfig::default()
    };
    let Ok(mut session) = MetricsSession::new(&config, Arc::new(PrometheusSink::new())) else {
        return;
    };
    for line in data.split(|b| *b == b'\n') {
        let _ = session.process_line(line);
    }
    assert!(session.hostnames_admitted() <= 4);
});
