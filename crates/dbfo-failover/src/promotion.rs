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

use dbfo_resilience::RetryExecutor;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::control_plane::DatabaseControlPlane;
use crate::error::Result;
use crate::probe::HealthProber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionStatus {
    Promoted,
    AlreadyPromoted,
}

impl PromotionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionStatus::Promoted => "promoted",
            PromotionStatus::AlreadyPromoted => "already_promoted",
        }
    }
}

/// Outcome of [`PromotionController::promote`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromotionReport {
    pub status: PromotionStatus,
    /// Control-plane acknowledgement; absent when no mutating call was made.
    pub raw_response: Option<Value>,
}

/// Promotes the configured replica to a standalone instance, at most once.
pub struct PromotionController {
    replica_instance_id: String,
    prober: HealthProber,
    database: Arc<dyn DatabaseControlPlane>,
    executor: RetryExecutor,
}

impl PromotionController {
    /// `executor` should only retry codes verified as transient for promotion.
    pub fn new(
        replica_instance_id: impl Into<String>,
        prober: HealthProber,
        database: Arc<dyn DatabaseControlPlane>,
        executor: RetryExecutor,
    ) -> Self {
        Self {
            replica_instance_id: replica_instance_id.into(),
            prober,
            database,
            executor,
        }
    }

    pub fn replica_instance_id(&self) -> &str {
        &self.replica_instance_id
    }

    /// Promote the replica unless it has already lost its source linkage.
    pub async fn promote(&self) -> Result<PromotionReport> {
        let replica = self.prober.probe(&self.replica_instance_id).await?;
        if !replica.is_replica {
            info!(
                replica = %self.replica_instance_id,
                raw_status = %replica.raw_status,
                "replica has no source linkage; skipping promotion"
            );
            return Ok(PromotionReport {
                status: PromotionStatus::AlreadyPromoted,
                raw_response: None,
            });
        }

        let replica_id = self.replica_instance_id.as_str();
        let response = self
            .executor
            .execute("database.promote_read_replica", || {
                self.database.promote_read_replica(replica_id)
            })
            .await
            .map_err(|err| {
                warn!(replica = %replica_id, error = %err, "replica promotion failed");
                err
            })?;
        info!(replica = %replica_id, "replica promotion accepted");
        Ok(PromotionReport {
            status: PromotionStatus::Promoted,
            raw_response: Some(response),
        })
    }
}

impl fmt::Debug for PromotionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromotionController")
            .field("replica_instance_id", &self.replica_instance_id)
            .field("prober", &self.prober)
            .finish_non_exhaustive()
    }
}
