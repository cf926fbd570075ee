//! ---
//! dbfo_section: "01-core-functionality"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Shared primitives and utilities for the failover runtime."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use std::fs;
use std::time::Duration;

use dbfo_common::config::AppConfig;
use dbfo_common::LogFormat;
use tempfile::tempdir;

const CONFIG: &str = r#"
[topology]
primary_instance_id = "billing-primary"
replica_instance_id = "billing-replica"
zone_id = "Z0BILLING"
record_name = "db.billing.example.com"
primary_endpoint = "billing-primary.abc.eu-west-1.rds.example.com"
replica_endpoint = "billing-replica.abc.eu-west-1.rds.example.com"
topic_id = "arn:example:sns:eu-west-1:123456789012:db-failover"
ttl_seconds = 30

[retry]
max_attempts = 5
base_delay_seconds = 1.5
max_delay = 10
retryable_error_codes = ["Throttling"]

[logging]
format = "pretty"
"#;

#[test]
fn loads_first_existing_candidate() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    let present = dir.path().join("dbfo.toml");
    fs::write(&present, CONFIG).unwrap();

    let loaded = AppConfig::load_with_source(&[missing, present.clone()]).unwrap();
    assert_eq!(loaded.source, present);

    let config = loaded.config;
    assert_eq!(config.topology.ttl_seconds, 30);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.base_delay_seconds, 1.5);
    assert_eq!(config.retry.max_delay, Duration::from_secs(10));
    assert_eq!(config.retry.retryable_error_codes, vec!["Throttling"]);
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert!(config.metrics.enabled);
}

#[test]
fn reports_inspected_candidates_when_nothing_exists() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.toml");
    let b = dir.path().join("b.toml");
    let err = AppConfig::load(&[a, b]).unwrap_err().to_string();
    assert!(err.contains("a.toml"));
    assert!(err.contains("b.toml"));
}

#[test]
fn invalid_file_fails_validation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, CONFIG.replace("max_attempts = 5", "max_attempts = 0")).unwrap();
    assert!(AppConfig::from_path(&path).is_err());
}
