//! ---
//! dbfo_section: "07-resilience-fault-tolerance"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Database failover controller components."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dbfo_common::config::{AppConfig, TopologyConfig};
use dbfo_resilience::RetryExecutor;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::control_plane::{ChangeInfo, DatabaseControlPlane, DnsControlPlane, NotificationService};
use crate::error::{FailoverError, Result};
use crate::metrics::FailoverMetrics;
use crate::notifier::Notifier;
use crate::probe::{HealthProber, InstanceStatus};
use crate::promotion::{PromotionController, PromotionReport};
use crate::router::{DnsWeightAssignment, TrafficRouter};

/// Alarm notification that triggers one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverEvent {
    #[serde(default)]
    pub source: String,
    pub detail: AlarmDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmDetail {
    #[serde(alias = "alarmName")]
    pub alarm_name: String,
}

impl FailoverEvent {
    pub fn new(source: impl Into<String>, alarm_name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            detail: AlarmDetail {
                alarm_name: alarm_name.into(),
            },
        }
    }

    /// Parse an event envelope. Unknown envelope fields are ignored.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|err| FailoverError::InvalidEvent(err.to_string()))
    }

    pub fn alarm_name(&self) -> &str {
        &self.detail.alarm_name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverAction {
    None,
    PromotedReplica,
    Error,
}

impl FailoverAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverAction::None => "none",
            FailoverAction::PromotedReplica => "promoted_replica",
            FailoverAction::Error => "error",
        }
    }
}

impl fmt::Display for FailoverAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The handler's only output: which action was taken, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverResult {
    pub status_code: u16,
    pub action: FailoverAction,
    pub message: String,
}

impl FailoverResult {
    fn ok(action: FailoverAction, message: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            action,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            action: FailoverAction::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// Render for the trigger: status code plus a JSON body naming the action.
    pub fn into_response(self, alarm_name: &str) -> TriggerResponse {
        TriggerResponse {
            status_code: self.status_code,
            body: json!({
                "action": self.action,
                "message": self.message,
                "alarm_name": alarm_name,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub status_code: u16,
    pub body: Value,
}

/// States of one invocation. Terminal: `PrimaryHealthy`, `BothDown`, `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverState {
    Init,
    CheckPrimary,
    PrimaryHealthy,
    CheckReplica,
    BothDown,
    PromoteAndCutover,
    Done,
}

impl FailoverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverState::Init => "init",
            FailoverState::CheckPrimary => "check_primary",
            FailoverState::PrimaryHealthy => "primary_healthy",
            FailoverState::CheckReplica => "check_replica",
            FailoverState::BothDown => "both_down",
            FailoverState::PromoteAndCutover => "promote_and_cutover",
            FailoverState::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FailoverState::PrimaryHealthy | FailoverState::BothDown | FailoverState::Done
        )
    }
}

/// Business outcome of the state machine. Faults travel separately as `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum FailoverOutcome {
    NoAction {
        primary: InstanceStatus,
    },
    PromotedReplica {
        promotion: PromotionReport,
        change: ChangeInfo,
    },
    BothDown {
        primary: InstanceStatus,
        replica: InstanceStatus,
    },
}

/// External control planes, constructed once per process.
#[derive(Clone)]
pub struct Collaborators {
    pub database: Arc<dyn DatabaseControlPlane>,
    pub dns: Arc<dyn DnsControlPlane>,
    pub notifications: Arc<dyn NotificationService>,
}

/// Entry point invoked once per alarm delivery.
pub struct FailoverOrchestrator {
    topology: Arc<TopologyConfig>,
    prober: HealthProber,
    promotion: PromotionController,
    router: TrafficRouter,
    notifier: Notifier,
    metrics: Option<FailoverMetrics>,
}

impl FailoverOrchestrator {
    pub fn new(
        topology: TopologyConfig,
        prober: HealthProber,
        promotion: PromotionController,
        router: TrafficRouter,
        notifier: Notifier,
    ) -> Self {
        Self {
            topology: Arc::new(topology),
            prober,
            promotion,
            router,
            notifier,
            metrics: None,
        }
    }

    /// Wire every component from configuration. `executor` carries the general
    /// retry policy; promotion derives a stricter one from `config.promotion`.
    pub fn from_config(
        config: &AppConfig,
        collaborators: Collaborators,
        executor: RetryExecutor,
    ) -> Self {
        let topology = config.topology.clone();
        let prober = HealthProber::new(collaborators.database.clone(), executor.clone());
        let promotion_executor = executor.with_policy(
            executor
                .policy()
                .with_retryable_codes(config.promotion.retryable_error_codes.iter().cloned()),
        );
        let promotion = PromotionController::new(
            topology.replica_instance_id.clone(),
            prober.clone(),
            collaborators.database,
            promotion_executor,
        );
        let router = TrafficRouter::new(collaborators.dns, executor.clone(), &topology);
        let notifier = Notifier::new(
            collaborators.notifications,
            executor,
            topology.topic_id.clone(),
        );
        Self::new(topology, prober, promotion, router, notifier)
    }

    pub fn with_metrics(mut self, metrics: FailoverMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn topology(&self) -> &TopologyConfig {
        &self.topology
    }

    /// Parse a raw event and handle it. Malformed events yield a 500 response.
    pub async fn handle_json(&self, raw: &str) -> TriggerResponse {
        match FailoverEvent::from_json(raw) {
            Ok(event) => {
                let result = self.handle(&event).await;
                result.into_response(event.alarm_name())
            }
            Err(err) => {
                error!(error = %err, "rejecting malformed failover event");
                self.record(FailoverAction::Error, Instant::now());
                FailoverResult::error(format!("failover failed: {}", err)).into_response("")
            }
        }
    }

    /// Run the state machine for one event. Never panics on control-plane faults:
    /// every error is logged and reported as a 500 result.
    pub async fn handle(&self, event: &FailoverEvent) -> FailoverResult {
        let started = Instant::now();
        let alarm = event.alarm_name();
        info!(alarm, source = %event.source, "failover event received");

        let result = match self.decide(event).await {
            Ok(FailoverOutcome::NoAction { primary }) => FailoverResult::ok(
                FailoverAction::None,
                format!(
                    "primary {} is {}; no action taken",
                    primary.instance_id, primary.raw_status
                ),
            ),
            Ok(FailoverOutcome::PromotedReplica { promotion, change }) => FailoverResult::ok(
                FailoverAction::PromotedReplica,
                format!(
                    "replica {} {}; traffic cut over in change {} ({})",
                    self.topology.replica_instance_id,
                    promotion.status.as_str(),
                    change.change_id,
                    change.change_status
                ),
            ),
            Ok(FailoverOutcome::BothDown { primary, replica }) => FailoverResult::error(format!(
                "primary {} is {} and replica {} is {}; manual intervention required",
                primary.instance_id, primary.raw_status, replica.instance_id, replica.raw_status
            )),
            Err(err) => {
                error!(alarm, error = %err, "failover aborted");
                FailoverResult::error(format!("failover failed: {}", err))
            }
        };

        info!(
            alarm,
            status_code = result.status_code,
            action = %result.action,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "failover event handled"
        );
        self.record(result.action, started);
        result
    }

    /// The decision itself. Only unexpected faults are returned as `Err`.
    pub async fn decide(&self, event: &FailoverEvent) -> Result<FailoverOutcome> {
        let alarm = event.alarm_name();
        let topology = &self.topology;

        self.transition(alarm, FailoverState::Init, FailoverState::CheckPrimary);
        let primary = self.prober.probe(&topology.primary_instance_id).await?;
        self.observe(&primary);
        if primary.available {
            self.transition(alarm, FailoverState::CheckPrimary, FailoverState::PrimaryHealthy);
            return Ok(FailoverOutcome::NoAction { primary });
        }

        warn!(
            alarm,
            primary = %primary.instance_id,
            raw_status = %primary.raw_status,
            "primary unavailable; checking replica"
        );
        self.transition(alarm, FailoverState::CheckPrimary, FailoverState::CheckReplica);
        let replica = self.prober.probe(&topology.replica_instance_id).await?;
        self.observe(&replica);
        if !replica.available {
            self.transition(alarm, FailoverState::CheckReplica, FailoverState::BothDown);
            error!(
                alarm,
                primary = %primary.instance_id,
                primary_status = %primary.raw_status,
                replica = %replica.instance_id,
                replica_status = %replica.raw_status,
                "primary and replica both unavailable"
            );
            let body = json!({
                "event": "both_instances_unavailable",
                "alarm_name": alarm,
                "primary": primary,
                "replica": replica,
                "timestamp": Utc::now().to_rfc3339(),
            });
            self.notifier
                .notify(
                    &format!("CRITICAL: database failover impossible ({})", alarm),
                    &body.to_string(),
                )
                .await;
            return Ok(FailoverOutcome::BothDown { primary, replica });
        }

        self.transition(alarm, FailoverState::CheckReplica, FailoverState::PromoteAndCutover);
        let promotion = self.promotion.promote().await?;
        if let Some(metrics) = &self.metrics {
            metrics.record_promotion(promotion.status);
        }
        let change = self.router.apply(DnsWeightAssignment::CUTOVER).await?;

        let body = json!({
            "event": "replica_promoted",
            "alarm_name": alarm,
            "primary": primary,
            "replica": replica,
            "promotion": promotion.status,
            "weights": DnsWeightAssignment::CUTOVER,
            "record_name": topology.record_name,
            "change": change,
            "timestamp": Utc::now().to_rfc3339(),
        });
        self.notifier
            .notify(
                &format!(
                    "Database failover: {} promoted ({})",
                    topology.replica_instance_id, alarm
                ),
                &body.to_string(),
            )
            .await;

        self.transition(alarm, FailoverState::PromoteAndCutover, FailoverState::Done);
        Ok(FailoverOutcome::PromotedReplica { promotion, change })
    }

    fn transition(&self, alarm: &str, from: FailoverState, to: FailoverState) {
        debug!(
            alarm,
            from = from.as_str(),
            to = to.as_str(),
            terminal = to.is_terminal(),
            "failover state transition"
        );
    }

    fn observe(&self, status: &InstanceStatus) {
        if let Some(metrics) = &self.metrics {
            metrics.set_available(&status.instance_id, status.available);
        }
    }

    fn record(&self, action: FailoverAction, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_invocation(action, started.elapsed());
        }
    }
}

impl fmt::Debug for FailoverOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailoverOrchestrator")
            .field("topology", &self.topology)
            .field("router", &self.router)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}
