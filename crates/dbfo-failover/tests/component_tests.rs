//! ---
//! dbfo_section: "07-resilience-fault-tolerance"
//! dbfo_subsection: "module"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Database failover controller components."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use std::sync::Arc;

use dbfo_common::config::{AppConfig, DEFAULT_PROMOTION_RETRYABLE_ERROR_CODES};
use dbfo_failover::memory::{DatabaseOperation, InMemoryDatabase, InMemoryDns, InMemoryNotifications};
use dbfo_failover::{
    ControlPlaneError, FailoverError, HealthProber, InstanceDescription, Notifier,
    PromotionController, PromotionStatus, TrafficRouter,
};
use dbfo_resilience::{RecordingSleeper, RetryExecutor, RetryPolicy};

fn executor(sleeper: &Arc<RecordingSleeper>) -> RetryExecutor {
    RetryExecutor::new(RetryPolicy::new(3, 2.0, ["Throttling", "InternalFailure"]))
        .with_sleeper(sleeper.clone())
}

fn replica_database() -> Arc<InMemoryDatabase> {
    Arc::new(
        InMemoryDatabase::new().with_instance(
            InstanceDescription::new("replica-1", "available")
                .with_endpoint("replica-1.internal")
                .replicating_from("primary-1"),
        ),
    )
}

fn promotion_controller(
    database: &Arc<InMemoryDatabase>,
    sleeper: &Arc<RecordingSleeper>,
) -> PromotionController {
    let executor = executor(sleeper);
    let prober = HealthProber::new(database.clone(), executor.clone());
    let promotion_executor = executor.with_policy(
        executor
            .policy()
            .with_retryable_codes(DEFAULT_PROMOTION_RETRYABLE_ERROR_CODES.iter().copied()),
    );
    PromotionController::new("replica-1", prober, database.clone(), promotion_executor)
}

#[tokio::test]
async fn second_promotion_is_already_promoted_without_mutation() {
    let database = replica_database();
    let sleeper = Arc::new(RecordingSleeper::new());
    let controller = promotion_controller(&database, &sleeper);

    let first = controller.promote().await.unwrap();
    assert_eq!(first.status, PromotionStatus::Promoted);
    assert!(first.raw_response.is_some());
    assert_eq!(database.promote_calls(), 1);

    let second = controller.promote().await.unwrap();
    assert_eq!(second.status, PromotionStatus::AlreadyPromoted);
    assert!(second.raw_response.is_none());
    assert_eq!(database.promote_calls(), 1);
}

#[tokio::test]
async fn throttled_promotion_is_retried() {
    let database = replica_database();
    let sleeper = Arc::new(RecordingSleeper::new());
    database.inject_fault(
        DatabaseOperation::Promote,
        ControlPlaneError::database("Throttling", "rate exceeded"),
    );
    let controller = promotion_controller(&database, &sleeper);

    let report = controller.promote().await.unwrap();

    assert_eq!(report.status, PromotionStatus::Promoted);
    assert_eq!(database.promote_calls(), 2);
    assert_eq!(sleeper.delays().len(), 1);
}

#[tokio::test]
async fn promotion_of_unknown_replica_propagates_lookup_error() {
    let database = Arc::new(InMemoryDatabase::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    let controller = promotion_controller(&database, &sleeper);

    let err = controller.promote().await.unwrap_err();

    match err {
        FailoverError::ControlPlane(err) => assert_eq!(err.code, "DBInstanceNotFound"),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(database.promote_calls(), 0);
}

#[tokio::test]
async fn prober_does_not_mask_missing_instances() {
    let database = Arc::new(InMemoryDatabase::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    let prober = HealthProber::new(database.clone(), executor(&sleeper));

    assert!(prober.probe("nope").await.is_err());
    assert_eq!(database.describe_calls(), 1);
}

#[tokio::test]
async fn router_always_writes_both_answers() {
    let config: AppConfig = r#"
        [topology]
        primary_instance_id = "p"
        replica_instance_id = "r"
        zone_id = "Z1"
        record_name = "db.example.com"
        primary_endpoint = "p.internal"
        replica_endpoint = "r.internal"
        topic_id = "t"
        ttl_seconds = 15
    "#
    .parse()
    .unwrap();
    let dns = Arc::new(InMemoryDns::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    let router = TrafficRouter::new(dns.clone(), executor(&sleeper), &config.topology);

    let change = router.set_weights(100, 0).await.unwrap();
    assert_eq!(change.change_status, "PENDING");
    let change = router.set_weights(0, 100).await.unwrap();
    assert_eq!(change.change_id, "C000000000002");

    let record = dns.record_set("Z1", "db.example.com").unwrap();
    assert_eq!(record.ttl_seconds, 15);
    assert_eq!(record.record_type, "CNAME");
    assert_eq!(dns.weight("Z1", "db.example.com", "primary"), Some(0));
    assert_eq!(dns.weight("Z1", "db.example.com", "replica"), Some(100));
}

#[tokio::test]
async fn notifier_swallows_exhausted_retries() {
    let notifications = Arc::new(InMemoryNotifications::new());
    for _ in 0..3 {
        notifications.inject_fault(ControlPlaneError::notification("Throttling", "slow down"));
    }
    let sleeper = Arc::new(RecordingSleeper::new());
    let notifier = Notifier::new(notifications.clone(), executor(&sleeper), "ops");

    notifier.notify("subject", "body").await;
    assert_eq!(notifications.publish_calls(), 3);
    assert!(notifications.published().is_empty());

    notifier.notify(&"x".repeat(250), "body").await;
    let published = notifications.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].subject.len(), 100);
}
