//! ---
//! dbfo_section: "05-networking-external-interfaces"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Weighted DNS traffic routing between primary and replica."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use std::fmt;
use std::sync::Arc;

use dbfo_common::config::TopologyConfig;
use dbfo_resilience::RetryExecutor;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::control_plane::{ChangeInfo, DnsControlPlane, WeightedRecordSet, WeightedTarget};
use crate::error::Result;

/// Weights for the two answers of the record. Zero keeps the answer present but unselected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsWeightAssignment {
    pub primary_weight: u32,
    pub replica_weight: u32,
}

impl DnsWeightAssignment {
    /// All traffic to the promoted replica.
    pub const CUTOVER: Self = Self::new(0, 100);

    pub const fn new(primary_weight: u32, replica_weight: u32) -> Self {
        Self {
            primary_weight,
            replica_weight,
        }
    }
}

/// Rewrites the weighted answer set of one record name.
pub struct TrafficRouter {
    dns: Arc<dyn DnsControlPlane>,
    executor: RetryExecutor,
    zone_id: String,
    record_name: String,
    record_type: String,
    ttl_seconds: u32,
    primary: (String, String),
    replica: (String, String),
}

impl TrafficRouter {
    pub fn new(
        dns: Arc<dyn DnsControlPlane>,
        executor: RetryExecutor,
        topology: &TopologyConfig,
    ) -> Self {
        Self {
            dns,
            executor,
            zone_id: topology.zone_id.clone(),
            record_name: topology.record_name.clone(),
            record_type: topology.record_type.clone(),
            ttl_seconds: topology.ttl_seconds,
            primary: (
                topology.primary_set_identifier.clone(),
                topology.primary_endpoint.clone(),
            ),
            replica: (
                topology.replica_set_identifier.clone(),
                topology.replica_endpoint.clone(),
            ),
        }
    }

    /// Full answer set for the given weights; both endpoints are always included.
    pub fn record_set(&self, assignment: DnsWeightAssignment) -> WeightedRecordSet {
        let target = |(set_identifier, endpoint): &(String, String), weight| WeightedTarget {
            set_identifier: set_identifier.clone(),
            endpoint: endpoint.clone(),
            weight,
        };
        WeightedRecordSet {
            name: self.record_name.clone(),
            record_type: self.record_type.clone(),
            ttl_seconds: self.ttl_seconds,
            targets: [
                target(&self.primary, assignment.primary_weight),
                target(&self.replica, assignment.replica_weight),
            ],
        }
    }

    /// Upsert the weighted answers. Returns once the change is accepted; resolver
    /// propagation is not awaited. Re-applying the same weights is harmless.
    pub async fn set_weights(&self, primary_weight: u32, replica_weight: u32) -> Result<ChangeInfo> {
        self.apply(DnsWeightAssignment::new(primary_weight, replica_weight))
            .await
    }

    pub async fn apply(&self, assignment: DnsWeightAssignment) -> Result<ChangeInfo> {
        let record_set = self.record_set(assignment);
        let change = self
            .executor
            .execute("dns.upsert_weighted_record_set", || {
                self.dns
                    .upsert_weighted_record_set(&self.zone_id, &record_set)
            })
            .await?;
        info!(
            zone = %self.zone_id,
            record = %self.record_name,
            primary_weight = assignment.primary_weight,
            replica_weight = assignment.replica_weight,
            change_id = %change.change_id,
            change_status = %change.change_status,
            "weighted record set updated"
        );
        Ok(change)
    }
}

impl fmt::Debug for TrafficRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrafficRouter")
            .field("zone_id", &self.zone_id)
            .field("record_name", &self.record_name)
            .finish_non_exhaustive()
    }
}
