//! ---
//! dbfo_section: "07-resilience-fault-tolerance"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Database failover controller components."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
//! Alarm-driven failover for a primary/replica database pair.
//!
//! The [`FailoverOrchestrator`] probes the primary, and when it is down and the
//! replica is healthy, promotes the replica, moves all weighted DNS traffic to it
//! and notifies operators. Every mutating step is safe to repeat, so duplicate
//! alarm deliveries converge on the same end state.

pub mod control_plane;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod notifier;
pub mod orchestrator;
pub mod probe;
pub mod promotion;
pub mod router;

pub use control_plane::{
    ChangeInfo, DatabaseControlPlane, DnsControlPlane, InstanceDescription, NotificationService,
    WeightedRecordSet, WeightedTarget, AVAILABLE_STATUS,
};
pub use error::{ControlPlaneError, FailoverError, Result, Service};
pub use metrics::FailoverMetrics;
pub use notifier::Notifier;
pub use orchestrator::{
    AlarmDetail, Collaborators, FailoverAction, FailoverEvent, FailoverOrchestrator, FailoverOutcome,
    FailoverResult, FailoverState, TriggerResponse,
};
pub use probe::{HealthProber, InstanceStatus};
pub use promotion::{PromotionController, PromotionReport, PromotionStatus};
pub use router::{DnsWeightAssignment, TrafficRouter};
