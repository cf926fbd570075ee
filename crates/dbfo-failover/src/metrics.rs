//! ---
//! dbfo_section: "03-persistence-logging"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Failover controller metrics."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use std::time::Duration;

use anyhow::Result;
use dbfo_common::metrics::SharedRegistry;
use prometheus::{self, Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts};

use crate::orchestrator::FailoverAction;
use crate::promotion::PromotionStatus;

/// Metrics published by the failover orchestrator.
#[derive(Clone)]
pub struct FailoverMetrics {
    registry: SharedRegistry,
    invocations_total: IntCounterVec,
    duration_seconds: Histogram,
    instance_available: IntGaugeVec,
    promotions_total: IntCounterVec,
}

impl FailoverMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let invocations_total = IntCounterVec::new(
            Opts::new(
                "dbfo_failover_invocations_total",
                "Failover handler invocations by resulting action",
            ),
            &["action"],
        )?;
        registry.register(Box::new(invocations_total.clone()))?;

        let duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "dbfo_failover_duration_seconds",
                "Wall-clock time from alarm receipt to terminal state",
            )
            .buckets(prometheus::exponential_buckets(0.01, 2.0, 14)?),
        )?;
        registry.register(Box::new(duration_seconds.clone()))?;

        let instance_available = IntGaugeVec::new(
            Opts::new(
                "dbfo_instance_available",
                "Availability (0/1) of an instance as seen by the most recent probe",
            ),
            &["instance"],
        )?;
        registry.register(Box::new(instance_available.clone()))?;

        let promotions_total = IntCounterVec::new(
            Opts::new(
                "dbfo_promotions_total",
                "Replica promotion attempts by status (promoted, already_promoted)",
            ),
            &["status"],
        )?;
        registry.register(Box::new(promotions_total.clone()))?;

        Ok(Self {
            registry,
            invocations_total,
            duration_seconds,
            instance_available,
            promotions_total,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_invocation(&self, action: FailoverAction, duration: Duration) {
        self.invocations_total
            .with_label_values(&[action.as_str()])
            .inc();
        self.duration_seconds.observe(duration.as_secs_f64());
    }

    pub fn set_available(&self, instance: &str, available: bool) {
        self.instance_available
            .with_label_values(&[instance])
            .set(i64::from(available));
    }

    pub fn record_promotion(&self, status: PromotionStatus) {
        self.promotions_total
            .with_label_values(&[status.as_str()])
            .inc();
    }
}

impl std::fmt::Debug for FailoverMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverMetrics").finish_non_exhaustive()
    }
}
