//! End-to-end test: work items flowing through the integrated system.

use maple_governor_capacity::{StartOutcome, StartRejection};
use maple_governor_integration::IntegrationError;
use maple_governor_tests::{booted_system, work_item};
use maple_governor_types::{IntegrationStatus, StopTrigger, WorkItemId, WorkStatus};
use serde_json::Value;

#[tokio::test]
async fn single_item_lifecycle() {
    let system = booted_system().await;
    let id = WorkItemId::new("GOV-1");

    let score = system.add_work_item(work_item("GOV-1", 4, 2, 3)).await.unwrap();
    assert!((score.final_score - 1.5).abs() < 1e-9);

    let outcome = system.start_work_item(&id).await.unwrap();
    assert_eq!(outcome, StartOutcome::Started);
    assert_eq!(system.status(), IntegrationStatus::Running);
    assert_eq!(system.state_manager().metrics().current_wip, 1);

    let done = system.complete_work_item(&id, 3, 120, 4).await.unwrap();
    assert_eq!(done.status, WorkStatus::Completed);
    assert_eq!(done.actual_workload, Some(3));

    let metrics = system.capacity().metrics();
    assert_eq!(metrics.current_wip, 0);
    assert_eq!(metrics.total_completed, 1);
    assert_eq!(metrics.daily_loc, 120);
    assert_eq!(system.status(), IntegrationStatus::Ready);
    assert_eq!(system.state_manager().metrics().current_wip, 0);
}

#[tokio::test]
async fn third_start_waits_for_a_free_slot() {
    let system = booted_system().await;
    for id in ["a", "b", "c"] {
        system.add_work_item(work_item(id, 5, 5, 5)).await.unwrap();
    }

    assert!(system.start_work_item(&"a".into()).await.unwrap().is_started());
    assert!(system.start_work_item(&"b".into()).await.unwrap().is_started());

    let third = system.start_work_item(&"c".into()).await.unwrap();
    assert_eq!(
        third,
        StartOutcome::Rejected(StartRejection::WipLimitReached {
            current: 2,
            limit: 2
        })
    );

    system.complete_work_item(&"a".into(), 5, 10, 1).await.unwrap();
    assert!(system.start_work_item(&"c".into()).await.unwrap().is_started());
    assert_eq!(system.capacity().current_wip(), 2);
}

#[tokio::test]
async fn full_system_is_within_limits_but_admits_nothing() {
    let system = booted_system().await;
    for id in ["a", "b"] {
        system.add_work_item(work_item(id, 5, 5, 5)).await.unwrap();
        system.start_work_item(&id.into()).await.unwrap();
    }

    let limits = system.capacity().check_capacity_limits();
    assert!(limits.wip_ok);
    assert!(!limits.can_add_work);
    assert!(limits.all_ok());

    let checkpoint = system.run_integration_check().await;
    assert_eq!(checkpoint.status, IntegrationStatus::Running);
}

#[tokio::test]
async fn blocking_frees_the_slot() {
    let system = booted_system().await;
    system.add_work_item(work_item("a", 5, 5, 5)).await.unwrap();
    system.start_work_item(&"a".into()).await.unwrap();

    system.block_work_item(&"a".into(), "waiting on review").await.unwrap();
    assert_eq!(system.capacity().current_wip(), 0);
    assert_eq!(system.status(), IntegrationStatus::Ready);

    let again = system.start_work_item(&"a".into()).await.unwrap();
    assert!(!again.is_started());
}

#[tokio::test]
async fn work_errors_are_typed() {
    let system = booted_system().await;
    system.add_work_item(work_item("a", 5, 5, 5)).await.unwrap();

    let duplicate = system.add_work_item(work_item("a", 5, 5, 5)).await;
    assert!(matches!(duplicate, Err(IntegrationError::Capacity(_))));

    let missing = system.start_work_item(&"nope".into()).await;
    assert!(matches!(missing, Err(IntegrationError::Capacity(_))));

    let not_started = system.complete_work_item(&"a".into(), 1, 0, 0).await;
    assert!(matches!(not_started, Err(IntegrationError::Capacity(_))));
}

#[tokio::test]
async fn starts_are_refused_during_emergency_stop() {
    let system = booted_system().await;
    system.add_work_item(work_item("a", 5, 5, 5)).await.unwrap();

    system
        .emergency_stop(StopTrigger::EquivalenceViolation, 0.95, Value::Null)
        .await;

    let refused = system.start_work_item(&"a".into()).await;
    assert!(matches!(refused, Err(IntegrationError::EmergencyStopActive)));
    assert_eq!(system.capacity().current_wip(), 0);
}
