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
use tracing::debug;

use crate::control_plane::{DatabaseControlPlane, InstanceDescription, AVAILABLE_STATUS};
use crate::error::Result;

/// Normalised view of one instance, created fresh for every probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceStatus {
    pub instance_id: String,
    pub raw_status: String,
    /// True only for the exact `available` status; transitional states count as down.
    pub available: bool,
    pub endpoint: Option<String>,
    pub is_replica: bool,
}

impl From<InstanceDescription> for InstanceStatus {
    fn from(description: InstanceDescription) -> Self {
        Self {
            available: description.status == AVAILABLE_STATUS,
            is_replica: description.source_instance_id.is_some(),
            instance_id: description.instance_id,
            raw_status: description.status,
            endpoint: description.endpoint,
        }
    }
}

/// Looks up instances on the database control plane through the retry executor.
#[derive(Clone)]
pub struct HealthProber {
    database: Arc<dyn DatabaseControlPlane>,
    executor: RetryExecutor,
}

impl HealthProber {
    pub fn new(database: Arc<dyn DatabaseControlPlane>, executor: RetryExecutor) -> Self {
        Self { database, executor }
    }

    /// Describe `instance_id`. Lookup failures such as an unknown instance are
    /// returned as errors, never reported as an unavailable status.
    pub async fn probe(&self, instance_id: &str) -> Result<InstanceStatus> {
        let description = self
            .executor
            .execute("database.describe_instance", || {
                self.database.describe_instance(instance_id)
            })
            .await?;
        let status = InstanceStatus::from(description);
        debug!(
            instance = %status.instance_id,
            raw_status = %status.raw_status,
            available = status.available,
            is_replica = status.is_replica,
            "instance probed"
        );
        Ok(status)
    }
}

impl fmt::Debug for HealthProber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthProber")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exact_available_status_counts() {
        for status in ["modifying", "backing-up", "Available", "available ", "failed"] {
            let probed = InstanceStatus::from(InstanceDescription::new("db-1", status));
            assert!(!probed.available, "{status} must not count as available");
        }
        let probed = InstanceStatus::from(InstanceDescription::new("db-1", "available"));
        assert!(probed.available);
    }

    #[test]
    fn replica_flag_follows_source_linkage() {
        let replica = InstanceStatus::from(
            InstanceDescription::new("db-2", "available")
                .with_endpoint("db-2.internal")
                .replicating_from("db-1"),
        );
        assert!(replica.is_replica);
        assert_eq!(replica.endpoint.as_deref(), Some("db-2.internal"));

        let standalone = InstanceStatus::from(InstanceDescription::new("db-2", "available"));
        assert!(!standalone.is_replica);
        assert_eq!(standalone.endpoint, None);
    }
}
