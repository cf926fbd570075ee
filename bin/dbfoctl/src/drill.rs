//! ---
//! dbfo_section: "05-networking-external-interfaces"
//! dbfo_subsection: "binary"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Operator CLI for configuration checks and failover drills."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use dbfo_common::config::AppConfig;
use dbfo_common::metrics::{new_registry, render_text};
use dbfo_failover::memory::{InMemoryDatabase, InMemoryDns, InMemoryNotifications};
use dbfo_failover::{
    Collaborators, FailoverEvent, FailoverMetrics, FailoverOrchestrator, HealthProber,
    InstanceDescription, InstanceStatus, TriggerResponse,
};
use dbfo_resilience::{ResilienceMetrics, RetryExecutor, RetryPolicy};
use serde::Deserialize;

/// Simulated fleet used for drills:
///
/// ```toml
/// [[instances]]
/// instance_id = "orders-primary"
/// status = "failed"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct FleetFile {
    #[serde(default)]
    pub instances: Vec<InstanceDescription>,
}

impl FleetFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read fleet file {}", path.display()))?;
        contents.parse()
    }
}

impl std::str::FromStr for FleetFile {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse fleet description")
    }
}

#[derive(Debug)]
pub struct DrillReport {
    pub response: TriggerResponse,
    pub metrics: Option<String>,
}

pub fn summarize(config: &AppConfig) -> String {
    let topology = &config.topology;
    let policy = RetryPolicy::from_config(&config.retry);
    format!(
        "primary: {} ({})\nreplica: {} ({})\nrecord: {} in zone {} [{} ttl={}s]\ntopic: {}\nretry: {} attempts, base {}s, worst-case sleep {:?}",
        topology.primary_instance_id,
        topology.primary_endpoint,
        topology.replica_instance_id,
        topology.replica_endpoint,
        topology.record_name,
        topology.zone_id,
        topology.record_type,
        topology.ttl_seconds,
        topology.topic_id,
        policy.max_attempts(),
        config.retry.base_delay_seconds,
        policy.worst_case_sleep(),
    )
}

/// Event JSON from a file, stdin (`-`), or synthesised from an alarm name.
pub fn read_event(path: Option<&Path>, alarm_name: Option<&str>) -> Result<String> {
    match (path, alarm_name) {
        (Some(path), _) if path == Path::new("-") => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read event from stdin")?;
            Ok(raw)
        }
        (Some(path), _) => fs::read_to_string(path)
            .with_context(|| format!("unable to read event file {}", path.display())),
        (None, Some(alarm_name)) => Ok(serde_json::to_string(&FailoverEvent::new(
            "dbfoctl",
            alarm_name,
        ))?),
        (None, None) => Err(anyhow!("either --event or --alarm-name is required")),
    }
}

pub async fn probe(config: &AppConfig, fleet: FleetFile, instance_id: &str) -> Result<InstanceStatus> {
    let database = Arc::new(InMemoryDatabase::from_instances(fleet.instances));
    let prober = HealthProber::new(
        database,
        RetryExecutor::new(RetryPolicy::from_config(&config.retry)),
    );
    Ok(prober.probe(instance_id).await?)
}

pub async fn handle(config: &AppConfig, fleet: FleetFile, raw_event: &str) -> Result<DrillReport> {
    let collaborators = Collaborators {
        database: Arc::new(InMemoryDatabase::from_instances(fleet.instances)),
        dns: Arc::new(InMemoryDns::new()),
        notifications: Arc::new(InMemoryNotifications::new()),
    };
    let mut executor = RetryExecutor::new(RetryPolicy::from_config(&config.retry));

    if !config.metrics.enabled {
        let orchestrator = FailoverOrchestrator::from_config(config, collaborators, executor);
        let response = orchestrator.handle_json(raw_event).await;
        return Ok(DrillReport {
            response,
            metrics: None,
        });
    }

    let registry = new_registry();
    executor = executor.with_metrics(ResilienceMetrics::new(registry.clone())?);
    let orchestrator = FailoverOrchestrator::from_config(config, collaborators, executor)
        .with_metrics(FailoverMetrics::new(registry.clone())?);
    let response = orchestrator.handle_json(raw_event).await;
    Ok(DrillReport {
        response,
        metrics: Some(render_text(&registry)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
        [topology]
        primary_instance_id = "orders-primary"
        replica_instance_id = "orders-replica"
        zone_id = "Z0ORDERS"
        record_name = "db.orders.example.com"
        primary_endpoint = "orders-primary.internal"
        replica_endpoint = "orders-replica.internal"
        topic_id = "ops-alerts"

        [retry]
        base_delay_seconds = 0.0
    "#;

    const FLEET: &str = r#"
        [[instances]]
        instance_id = "orders-primary"
        status = "failed"
        endpoint = "orders-primary.internal"

        [[instances]]
        instance_id = "orders-replica"
        status = "available"
        endpoint = "orders-replica.internal"
        source_instance_id = "orders-primary"
    "#;

    #[tokio::test]
    async fn drill_promotes_replica_and_reports_metrics() {
        let config: AppConfig = CONFIG.parse().unwrap();
        let fleet: FleetFile = FLEET.parse().unwrap();
        let raw = read_event(None, Some("primary-db-availability-test")).unwrap();

        let report = handle(&config, fleet, &raw).await.unwrap();

        assert_eq!(report.response.status_code, 200);
        assert_eq!(report.response.body["action"], "promoted_replica");
        assert_eq!(
            report.response.body["alarm_name"],
            "primary-db-availability-test"
        );
        let metrics = report.metrics.unwrap();
        assert!(metrics.contains("dbfo_failover_invocations_total"));
        assert!(metrics.contains("dbfo_retry_attempts_total"));
    }

    #[tokio::test]
    async fn probe_reads_fleet_state() {
        let config: AppConfig = CONFIG.parse().unwrap();
        let fleet: FleetFile = FLEET.parse().unwrap();

        let status = probe(&config, fleet, "orders-replica").await.unwrap();

        assert!(status.available);
        assert!(status.is_replica);
    }

    #[test]
    fn reads_event_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"detail":{{"alarm_name":"a"}}}}"#).unwrap();
        let raw = read_event(Some(file.path()), None).unwrap();
        assert!(raw.contains("alarm_name"));
        assert!(read_event(None, None).is_err());
    }

    #[test]
    fn summary_mentions_worst_case_sleep() {
        let config: AppConfig = CONFIG.parse().unwrap();
        let summary = summarize(&config);
        assert!(summary.contains("orders-replica"));
        assert!(summary.contains("worst-case sleep"));
    }
}
