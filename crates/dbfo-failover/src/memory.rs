//! ---
//! dbfo_section: "11-simulation"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "In-memory control planes for drills and tests."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
//! In-memory control planes. They keep the state a real control plane would,
//! count every call, and replay scripted faults so retry and failure paths can
//! be exercised without cloud access.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::control_plane::{
    ChangeInfo, DatabaseControlPlane, DnsControlPlane, InstanceDescription, NotificationService,
    WeightedRecordSet,
};
use crate::error::ControlPlaneError;

/// Database operations that accept scripted faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseOperation {
    Describe,
    Promote,
}

#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    instances: Mutex<IndexMap<String, InstanceDescription>>,
    faults: Mutex<HashMap<DatabaseOperation, VecDeque<ControlPlaneError>>>,
    describe_calls: AtomicUsize,
    promote_calls: AtomicUsize,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_instances(instances: impl IntoIterator<Item = InstanceDescription>) -> Self {
        let database = Self::new();
        for instance in instances {
            database.insert(instance);
        }
        database
    }

    pub fn with_instance(self, instance: InstanceDescription) -> Self {
        self.insert(instance);
        self
    }

    pub fn insert(&self, instance: InstanceDescription) {
        self.instances
            .lock()
            .insert(instance.instance_id.clone(), instance);
    }

    pub fn set_status(&self, instance_id: &str, status: &str) {
        if let Some(instance) = self.instances.lock().get_mut(instance_id) {
            instance.status = status.to_owned();
        }
    }

    pub fn instance(&self, instance_id: &str) -> Option<InstanceDescription> {
        self.instances.lock().get(instance_id).cloned()
    }

    /// Queue a fault; each call to `operation` consumes one queued fault before
    /// touching any state.
    pub fn inject_fault(&self, operation: DatabaseOperation, fault: ControlPlaneError) {
        self.faults
            .lock()
            .entry(operation)
            .or_default()
            .push_back(fault);
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    /// Mutating calls received, including ones answered with a fault.
    pub fn promote_calls(&self) -> usize {
        self.promote_calls.load(Ordering::SeqCst)
    }

    fn take_fault(&self, operation: DatabaseOperation) -> Option<ControlPlaneError> {
        self.faults
            .lock()
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
    }

    fn not_found(instance_id: &str) -> ControlPlaneError {
        ControlPlaneError::database(
            "DBInstanceNotFound",
            format!("DBInstance {} not found", instance_id),
        )
    }
}

#[async_trait]
impl DatabaseControlPlane for InMemoryDatabase {
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<InstanceDescription, ControlPlaneError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = self.take_fault(DatabaseOperation::Describe) {
            return Err(fault);
        }
        self.instance(instance_id)
            .ok_or_else(|| Self::not_found(instance_id))
    }

    async fn promote_read_replica(&self, instance_id: &str) -> Result<Value, ControlPlaneError> {
        self.promote_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = self.take_fault(DatabaseOperation::Promote) {
            return Err(fault);
        }
        let mut instances = self.instances.lock();
        let instance = instances
            .get_mut(instance_id)
            .ok_or_else(|| Self::not_found(instance_id))?;
        let Some(source) = instance.source_instance_id.take() else {
            return Err(ControlPlaneError::database(
                "InvalidDBInstanceState",
                format!("DBInstance {} is not a read replica", instance_id),
            ));
        };
        debug!(instance = instance_id, %source, "replica detached from source");
        Ok(json!({
            "DBInstance": {
                "DBInstanceIdentifier": instance.instance_id,
                "DBInstanceStatus": instance.status,
                "Endpoint": instance.endpoint,
                "PromotedFrom": source,
            }
        }))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDns {
    record_sets: Mutex<IndexMap<(String, String), WeightedRecordSet>>,
    faults: Mutex<VecDeque<ControlPlaneError>>,
    upsert_calls: AtomicUsize,
    next_change: AtomicU64,
}

impl InMemoryDns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_set(&self, zone_id: &str, name: &str) -> Option<WeightedRecordSet> {
        self.record_sets
            .lock()
            .get(&(zone_id.to_owned(), name.to_owned()))
            .cloned()
    }

    /// Current weight of one answer of a record.
    pub fn weight(&self, zone_id: &str, name: &str, set_identifier: &str) -> Option<u32> {
        self.record_set(zone_id, name)
            .and_then(|set| set.target(set_identifier).map(|target| target.weight))
    }

    pub fn inject_fault(&self, fault: ControlPlaneError) {
        self.faults.lock().push_back(fault);
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsControlPlane for InMemoryDns {
    async fn upsert_weighted_record_set(
        &self,
        zone_id: &str,
        record_set: &WeightedRecordSet,
    ) -> Result<ChangeInfo, ControlPlaneError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = self.faults.lock().pop_front() {
            return Err(fault);
        }
        self.record_sets.lock().insert(
            (zone_id.to_owned(), record_set.name.clone()),
            record_set.clone(),
        );
        let sequence = self.next_change.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ChangeInfo {
            change_id: format!("C{:012}", sequence),
            change_status: "PENDING".to_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedMessage {
    pub topic_id: String,
    pub subject: String,
    pub body: String,
    pub message_id: String,
}

#[derive(Debug, Default)]
pub struct InMemoryNotifications {
    published: Mutex<Vec<PublishedMessage>>,
    faults: Mutex<VecDeque<ControlPlaneError>>,
    publish_calls: AtomicUsize,
}

impl InMemoryNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }

    pub fn inject_fault(&self, fault: ControlPlaneError) {
        self.faults.lock().push_back(fault);
    }

    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationService for InMemoryNotifications {
    async fn publish(
        &self,
        topic_id: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, ControlPlaneError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = self.faults.lock().pop_front() {
            return Err(fault);
        }
        let message_id = Uuid::new_v4().to_string();
        self.published.lock().push(PublishedMessage {
            topic_id: topic_id.to_owned(),
            subject: subject.to_owned(),
            body: body.to_owned(),
            message_id: message_id.clone(),
        });
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn promote_detaches_replica_once() {
        let database = InMemoryDatabase::new().with_instance(
            InstanceDescription::new("replica", "available").replicating_from("primary"),
        );
        let response = database.promote_read_replica("replica").await.unwrap();
        assert_eq!(response["DBInstance"]["PromotedFrom"], "primary");
        assert!(database.instance("replica").unwrap().source_instance_id.is_none());

        let err = database.promote_read_replica("replica").await.unwrap_err();
        assert_eq!(err.code, "InvalidDBInstanceState");
        assert_eq!(database.promote_calls(), 2);
    }

    #[tokio::test]
    async fn scripted_faults_are_consumed_in_order() {
        let database = InMemoryDatabase::new().with_instance(InstanceDescription::new("db", "available"));
        database.inject_fault(
            DatabaseOperation::Describe,
            ControlPlaneError::database("Throttling", "slow down"),
        );
        assert_eq!(
            database.describe_instance("db").await.unwrap_err().code,
            "Throttling"
        );
        assert_eq!(database.describe_instance("db").await.unwrap().status, "available");
        assert_eq!(
            database.describe_instance("missing").await.unwrap_err().code,
            "DBInstanceNotFound"
        );
        assert_eq!(database.describe_calls(), 3);
    }
}
