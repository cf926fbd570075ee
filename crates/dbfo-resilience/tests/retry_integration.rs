//! ---
//! dbfo_section: "07-resilience-fault-tolerance"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Retry and backoff strategies for control-plane calls."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dbfo_common::config::RetryConfig;
use dbfo_common::metrics::new_registry;
use dbfo_resilience::{ErrorCode, RecordingSleeper, ResilienceMetrics, RetryExecutor, RetryPolicy};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("{code}: {message}")]
struct ServiceError {
    code: String,
    message: String,
}

impl ServiceError {
    fn new(code: &str) -> Self {
        Self {
            code: code.to_owned(),
            message: "injected".to_owned(),
        }
    }
}

impl ErrorCode for ServiceError {
    fn error_code(&self) -> Option<&str> {
        Some(&self.code)
    }
}

fn counter_value(registry: &dbfo_common::SharedRegistry, operation: &str, outcome: &str) -> u64 {
    registry
        .gather()
        .iter()
        .find(|family| family.get_name() == "dbfo_retry_attempts_total")
        .map(|family| {
            family
                .get_metric()
                .iter()
                .filter(|metric| {
                    let labels = metric.get_label();
                    labels
                        .iter()
                        .any(|l| l.get_name() == "operation" && l.get_value() == operation)
                        && labels
                            .iter()
                            .any(|l| l.get_name() == "outcome" && l.get_value() == outcome)
                })
                .map(|metric| metric.get_counter().get_value() as u64)
                .sum()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn configured_policy_retries_and_records_metrics() {
    let registry = new_registry();
    let metrics = ResilienceMetrics::new(registry.clone()).unwrap();
    let sleeper = Arc::new(RecordingSleeper::new());
    let config = RetryConfig {
        max_attempts: 4,
        base_delay_seconds: 3.0,
        max_delay: Duration::from_secs(10),
        retryable_error_codes: vec!["ServiceUnavailable".into()],
    };
    let executor = RetryExecutor::new(RetryPolicy::from_config(&config))
        .with_sleeper(sleeper.clone())
        .with_metrics(metrics);

    let calls = AtomicU32::new(0);
    let value = executor
        .execute("dns.upsert", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(ServiceError::new("ServiceUnavailable"))
                } else {
                    Ok("C0001")
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, "C0001");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(
        sleeper.delays(),
        vec![
            Duration::from_secs(3),
            Duration::from_secs(9),
            Duration::from_secs(10)
        ]
    );
    assert_eq!(counter_value(&registry, "dns.upsert", "retry"), 3);
    assert_eq!(counter_value(&registry, "dns.upsert", "success"), 1);
}

#[tokio::test]
async fn derived_policy_shares_sleeper_but_not_codes() {
    let sleeper = Arc::new(RecordingSleeper::new());
    let base = RetryExecutor::new(RetryPolicy::new(3, 2.0, ["Throttling", "InternalFailure"]))
        .with_sleeper(sleeper.clone());
    let strict = base.with_policy(base.policy().with_retryable_codes(["Throttling"]));

    let calls = AtomicU32::new(0);
    let result: Result<(), _> = strict
        .execute("rds.promote", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ServiceError::new("InternalFailure")) }
        })
        .await;

    assert_eq!(result.unwrap_err().code, "InternalFailure");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(sleeper.delays().is_empty());

    let result: Result<(), _> = strict
        .execute("rds.promote", || async { Err(ServiceError::new("Throttling")) })
        .await;
    assert!(result.is_err());
    assert_eq!(sleeper.delays().len(), 2);
}
