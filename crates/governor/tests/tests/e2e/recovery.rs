//! End-to-end test: leaving an emergency stop.

use std::time::Duration;

use maple_governor_equivalence::TestCase;
use maple_governor_tests::booted_system;
use maple_governor_types::{IntegrationStatus, StopPolicy, StopTrigger, SystemState};
use serde_json::{json, Value};
use tokio::time::advance;

#[tokio::test(start_paused = true)]
async fn recovery_waits_for_warmup() {
    let system = booted_system().await;
    for _ in 0..3 {
        system
            .emergency_stop(StopTrigger::EquivalenceViolation, 0.5, json!({}))
            .await;
    }
    assert_eq!(system.status(), IntegrationStatus::EmergencyStop);

    let blocked = system.recover_from_emergency_stop("operator retry").await;
    assert!(!blocked.recovered);
    assert_eq!(blocked.blocking_triggers, vec![StopTrigger::EquivalenceViolation]);
    assert_eq!(system.status(), IntegrationStatus::EmergencyStop);

    advance(Duration::from_secs(61)).await;
    let report = system.recover_from_emergency_stop("warmup elapsed").await;

    assert!(report.recovered);
    assert_eq!(report.status, IntegrationStatus::Ready);
    assert_eq!(system.state_manager().current_state(), SystemState::Ready);
    assert!(system.safety().is_enabled());
    assert_eq!(system.active_policy(), None);

    let checkpoint = report.checkpoint.expect("confirmation check");
    assert!(checkpoint.stops.is_empty());
    assert_eq!(checkpoint.status, IntegrationStatus::Ready);
}

#[tokio::test]
async fn recovery_is_a_no_op_when_not_stopped() {
    let system = booted_system().await;
    let report = system.recover_from_emergency_stop("nothing to do").await;
    assert!(!report.recovered);
    assert_eq!(report.status, IntegrationStatus::Ready);
    assert!(report.checkpoint.is_none());
}

#[tokio::test(start_paused = true)]
async fn recovery_treats_equivalence_as_fresh() {
    let system = booted_system().await;
    system
        .equivalence()
        .register_test_case(TestCase::new("echo", json!({"x": 1}), json!({"x": 1})))
        .unwrap();
    system
        .equivalence()
        .run_validation("echo", &|_: &Value| -> anyhow::Result<Value> {
            anyhow::bail!("candidate crashed")
        })
        .unwrap();
    assert_eq!(system.equivalence().overall_score(), 0.0);

    let checkpoint = system.run_integration_check().await;
    assert_eq!(checkpoint.status, IntegrationStatus::EmergencyStop);
    assert_eq!(system.active_policy(), Some(StopPolicy::Immediate));

    advance(Duration::from_secs(60)).await;
    let report = system.recover_from_emergency_stop("candidate fixed").await;

    assert!(report.recovered);
    assert_eq!(system.equivalence().overall_score(), 1.0);
    let metrics = system.state_manager().metrics();
    assert_eq!(metrics.equivalence_score, 1.0);
    assert_eq!(metrics.emergency_stop_count, 1);
}

#[tokio::test(start_paused = true)]
async fn recovery_clears_gradual_fallback() {
    let system = booted_system().await;
    system
        .emergency_stop(StopTrigger::ObservabilityMissing, 0.5, json!({}))
        .await;
    system
        .emergency_stop(StopTrigger::PerformanceThreshold, 0.95, json!({}))
        .await;
    assert!(system.fallback_active());
    assert!(system.capacity().is_conservative());

    advance(Duration::from_secs(60)).await;
    let report = system.recover_from_emergency_stop("all clear").await;

    assert!(report.recovered);
    assert!(!system.fallback_active());
    assert!(!system.capacity().is_conservative());
    assert!(!system.safety().is_conservative());
}
