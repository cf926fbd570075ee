//! ---
//! dbfo_section: "05-networking-external-interfaces"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Collaborator interfaces for the database, DNS and notification control planes."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ControlPlaneError;

/// Lifecycle status of a fully operational instance. Every other status is unavailable.
pub const AVAILABLE_STATUS: &str = "available";

/// Instance record as returned by the database control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescription {
    pub instance_id: String,
    pub status: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Set while the instance replicates from a source; cleared by promotion.
    #[serde(default)]
    pub source_instance_id: Option<String>,
}

impl InstanceDescription {
    pub fn new(instance_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            status: status.into(),
            endpoint: None,
            source_instance_id: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn replicating_from(mut self, source: impl Into<String>) -> Self {
        self.source_instance_id = Some(source.into());
        self
    }
}

/// One answer of a weighted record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedTarget {
    pub set_identifier: String,
    pub endpoint: String,
    pub weight: u32,
}

/// Complete weighted answer set for a record name: always exactly two targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedRecordSet {
    pub name: String,
    pub record_type: String,
    pub ttl_seconds: u32,
    pub targets: [WeightedTarget; 2],
}

impl WeightedRecordSet {
    pub fn target(&self, set_identifier: &str) -> Option<&WeightedTarget> {
        self.targets
            .iter()
            .find(|target| target.set_identifier == set_identifier)
    }
}

/// Acknowledgement of an accepted DNS change. Propagation is not implied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeInfo {
    pub change_id: String,
    pub change_status: String,
}

#[async_trait]
pub trait DatabaseControlPlane: Send + Sync {
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<InstanceDescription, ControlPlaneError>;

    /// Detach a read replica from its source, turning it into a standalone instance.
    async fn promote_read_replica(&self, instance_id: &str) -> Result<Value, ControlPlaneError>;
}

#[async_trait]
pub trait DnsControlPlane: Send + Sync {
    /// Create or fully overwrite every weighted answer of `record_set.name`.
    async fn upsert_weighted_record_set(
        &self,
        zone_id: &str,
        record_set: &WeightedRecordSet,
    ) -> Result<ChangeInfo, ControlPlaneError>;
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Publish a message and return the service-assigned message id.
    async fn publish(
        &self,
        topic_id: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, ControlPlaneError>;
}
