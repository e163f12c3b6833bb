//! End-to-end test: the integration heartbeat turning component signals
//! into stops, status and the composite score.

use std::sync::Arc;
use std::time::Duration;

use maple_governor_equivalence::TestCase;
use maple_governor_integration::StopDecision;
use maple_governor_safety::FnInvariant;
use maple_governor_state::WorkloadLevel;
use maple_governor_tests::{booted_system, work_item};
use maple_governor_types::{ComponentHealth, IntegrationStatus, SafetyLevel, StopPolicy, StopTrigger};
use serde_json::{json, Value};
use tokio::time::advance;

fn half_right(_: &Value) -> anyhow::Result<Value> {
    Ok(json!({ "status": "ok" }))
}

#[tokio::test]
async fn healthy_heartbeat() {
    let system = booted_system().await;
    let checkpoint = system.run_integration_check().await;

    assert_eq!(checkpoint.status, IntegrationStatus::Ready);
    assert_eq!(checkpoint.safety.level, SafetyLevel::Safe);
    assert!(checkpoint.capacity.all_ok());
    assert_eq!(checkpoint.equivalence.overall_score, 1.0);
    assert_eq!(checkpoint.composite_score, 1.0);
    assert!(system.last_checkpoint().is_some());

    let health = system.health_check();
    assert_eq!(health.overall, ComponentHealth::Healthy);
    assert_eq!(health.components.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn persistent_drift_stops_after_three_heartbeats() {
    let system = booted_system().await;
    system
        .equivalence()
        .register_test_case(TestCase::new(
            "health",
            json!({}),
            json!({ "status": "ok", "version": 2 }),
        ))
        .unwrap();
    system.equivalence().run_validation("health", &half_right).unwrap();
    assert_eq!(system.equivalence().overall_score(), 0.5);

    let first = system.run_integration_check().await;
    assert_eq!(first.status, IntegrationStatus::Warning);
    assert_eq!(
        first.stops[0].decision(),
        &StopDecision::PendingHysteresis {
            violations: 1,
            required: 3
        }
    );
    assert_eq!(first.safety.level, SafetyLevel::High);

    advance(Duration::from_secs(30)).await;
    let second = system.run_integration_check().await;
    assert!(!second.stop_executed());

    advance(Duration::from_secs(30)).await;
    let third = system.run_integration_check().await;
    assert!(third.stop_executed());
    assert_eq!(third.status, IntegrationStatus::EmergencyStop);
    assert_eq!(system.active_policy(), Some(StopPolicy::Hysteresis));
    assert!(third.composite_score <= 0.5);

    let health = system.health_check();
    assert_eq!(health.overall, ComponentHealth::Critical);
}

#[tokio::test]
async fn quota_breach_degrades_gradually() {
    let system = booted_system().await;
    system.add_work_item(work_item("big", 8, 5, 5)).await.unwrap();
    system.start_work_item(&"big".into()).await.unwrap();
    system
        .complete_work_item(&"big".into(), 9, 1_500, 3)
        .await
        .unwrap();

    let checkpoint = system.run_integration_check().await;

    assert_eq!(checkpoint.status, IntegrationStatus::Warning);
    assert!(!checkpoint.capacity.daily_loc_ok);
    assert_eq!(checkpoint.stops.len(), 1);
    assert_eq!(checkpoint.stops[0].record.policy, StopPolicy::Gradual);
    assert_eq!(checkpoint.stops[0].record.trigger, StopTrigger::PerformanceThreshold);
    assert!(system.fallback_active());
    assert_eq!(system.capacity().admission_limit(), 1);
    assert_eq!(system.capacity().wip_limit(), 2);
    assert_ne!(system.status(), IntegrationStatus::EmergencyStop);

    // 0.4 (safety) + 0.3 (equivalence) + 0.05 bonus, halved for the stop.
    assert!((checkpoint.composite_score - 0.375).abs() < 1e-9);

    let again = system.run_integration_check().await;
    assert!(!again.stop_executed());
    assert_eq!(again.status, IntegrationStatus::Warning);
}

#[tokio::test]
async fn fallback_with_work_in_flight_is_not_a_capacity_breach() {
    let system = booted_system().await;
    for id in ["a", "b", "c"] {
        system.add_work_item(work_item(id, 5, 5, 5)).await.unwrap();
    }
    system.start_work_item(&"a".into()).await.unwrap();
    system.start_work_item(&"b".into()).await.unwrap();

    system
        .emergency_stop(StopTrigger::ObservabilityMissing, 0.5, json!({}))
        .await;
    assert!(system.fallback_active());

    let checkpoint = system.run_integration_check().await;
    assert!(checkpoint.capacity.wip_ok);
    assert!(checkpoint.capacity.violations().is_empty());
    assert!(checkpoint.stops.is_empty());
    assert_eq!(checkpoint.status, IntegrationStatus::Warning);
    assert!(checkpoint.safety.failed_ids().is_empty());

    let metrics = system.state_manager().metrics();
    assert_eq!(metrics.current_wip, 2);
    assert_eq!(metrics.wip_limit, 2);
    assert_eq!(metrics.capacity_utilization, 1.0);

    let refused = system.start_work_item(&"c".into()).await.unwrap();
    assert!(!refused.is_started());
    assert_eq!(system.capacity().current_wip(), 2);
}

#[tokio::test]
async fn critical_host_invariant_stops_immediately() {
    let system = booted_system().await;
    system
        .safety()
        .register_invariant(Arc::new(
            FnInvariant::new("ledger-balanced", "host", || Ok(false)).critical(),
        ))
        .unwrap();

    let checkpoint = system.run_integration_check().await;

    assert_eq!(checkpoint.safety.level, SafetyLevel::Critical);
    assert_eq!(checkpoint.status, IntegrationStatus::EmergencyStop);
    assert_eq!(system.active_policy(), Some(StopPolicy::Immediate));
    assert!(!system.safety().is_enabled());

    let next = system.run_integration_check().await;
    assert!(!next.safety.framework_enabled);
    assert!(next.stops.is_empty());
    assert_eq!(next.status, IntegrationStatus::EmergencyStop);
}

#[tokio::test]
async fn heartbeat_publishes_metrics() {
    let system = booted_system().await;
    system.add_work_item(work_item("a", 5, 5, 5)).await.unwrap();
    system.start_work_item(&"a".into()).await.unwrap();

    let checkpoint = system.run_integration_check().await;
    assert_eq!(checkpoint.status, IntegrationStatus::Running);

    let metrics = system.state_manager().metrics();
    assert_eq!(metrics.current_wip, 1);
    assert_eq!(metrics.wip_limit, 2);
    assert!((metrics.capacity_utilization - 0.5).abs() < 1e-9);
    assert_eq!(metrics.workload_level, WorkloadLevel::Moderate);
    assert_eq!(metrics.safety_score, 1.0);
    assert_eq!(metrics.equivalence["overall_score"], json!(1.0));
}

#[tokio::test(start_paused = true)]
async fn stop_conditions_report_live_signals() {
    let system = booted_system().await;
    let quiet = system.check_emergency_stop_conditions();
    assert!(!quiet.should_trigger);
    assert_eq!(quiet.windows.len(), 3);

    for _ in 0..2 {
        system
            .emergency_stop(StopTrigger::PerformanceThreshold, 0.4, json!({}))
            .await;
    }
    let conditions = system.check_emergency_stop_conditions();
    let window = conditions
        .windows
        .iter()
        .find(|w| w.trigger == StopTrigger::PerformanceThreshold)
        .unwrap();
    assert_eq!(window.violations_in_span, 2);
    assert!(!window.satisfied);
    assert!(!conditions.should_trigger);

    let report = system.get_integration_report();
    assert_eq!(report.recent_stops.len(), 2);
    assert_eq!(report.emergency_stop_count, 0);
}
