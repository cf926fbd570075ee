//! ---
//! dbfo_section: "07-resilience-fault-tolerance"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Retry and backoff strategies for control-plane calls."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use std::time::Duration;

use anyhow::Result;
use dbfo_common::metrics::SharedRegistry;
use prometheus::{self, HistogramOpts, HistogramVec, IntCounterVec, Opts};

/// Metrics published by the retry executor.
#[derive(Clone)]
pub struct ResilienceMetrics {
    registry: SharedRegistry,
    retry_attempts_total: IntCounterVec,
    backoff_seconds: HistogramVec,
}

impl ResilienceMetrics {
    /// Register the retry metric family against the provided registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let retry_attempts_total = IntCounterVec::new(
            Opts::new(
                "dbfo_retry_attempts_total",
                "Control-plane call attempts by operation and outcome (success, retry, fatal, exhausted)",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let histogram_opts = HistogramOpts::new(
            "dbfo_retry_backoff_seconds",
            "Backoff delays slept between attempts of a control-plane call",
        )
        .buckets(prometheus::exponential_buckets(0.25, 2.0, 10)?);
        let backoff_seconds = HistogramVec::new(histogram_opts, &["operation"])?;
        registry.register(Box::new(backoff_seconds.clone()))?;

        Ok(Self {
            registry,
            retry_attempts_total,
            backoff_seconds,
        })
    }

    /// Expose the underlying shared registry for convenience.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Count one attempt of `operation` ending in `outcome`.
    pub fn record_attempt(&self, operation: &str, outcome: &str) {
        self.retry_attempts_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Record a backoff delay before the next attempt of `operation`.
    pub fn observe_backoff(&self, operation: &str, delay: Duration) {
        self.backoff_seconds
            .with_label_values(&[operation])
            .observe(delay.as_secs_f64());
    }
}

impl std::fmt::Debug for ResilienceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceMetrics").finish_non_exhaustive()
    }
}
