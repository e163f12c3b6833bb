//! End-to-end test: the shared state manager, configuration and golden set
//! seen through the integrated system.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use maple_governor_equivalence::{hash_golden_set, STATUS_OK, STATUS_UNPROCESSABLE};
use maple_governor_integration::{GovernorConfig, IntegratedSafetySystem};
use maple_governor_state::{MetricsUpdate, StateManager, StateTopic};
use maple_governor_tests::{booted_system, booted_with, init_tracing};
use maple_governor_types::{IntegrationStatus, StopTrigger, SystemState};
use serde_json::json;

#[tokio::test]
async fn bad_metrics_are_repaired_not_rejected() {
    let system = booted_system().await;
    let report = system
        .state_manager()
        .update_metrics(MetricsUpdate::new().current_wip(-5).safety_score(5.0));

    assert_eq!(report.metrics.current_wip, 0);
    assert_eq!(report.metrics.safety_score, 1.0);
    assert_eq!(report.repairs.len(), 2);
}

#[tokio::test]
async fn no_evidence_means_full_equivalence() {
    let system = booted_system().await;
    let metrics = system.equivalence().metrics();
    assert_eq!(metrics.overall_score, 1.0);
    assert_eq!(metrics.total_tests, 0);

    let checkpoint = system.run_integration_check().await;
    assert!(checkpoint.stops.is_empty());
}

#[tokio::test]
async fn one_state_manager_serves_two_systems() {
    init_tracing();
    let sm = Arc::new(StateManager::new());
    let a = IntegratedSafetySystem::start(GovernorConfig::default(), sm.clone())
        .await
        .unwrap();
    let b = IntegratedSafetySystem::start(GovernorConfig::default(), sm.clone())
        .await
        .unwrap();

    a.emergency_stop(StopTrigger::EquivalenceViolation, 0.95, json!({}))
        .await;

    assert_eq!(sm.current_state(), SystemState::EmergencyStop);
    assert_eq!(b.status(), IntegrationStatus::EmergencyStop);
    assert!(b.check_emergency_stop_conditions().should_trigger);
}

#[tokio::test]
async fn misbehaving_listener_does_not_break_stops() {
    let system = booted_system().await;
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();

    system
        .state_manager()
        .add_listener(StateTopic::EmergencyStop, |_| panic!("listener bug"));
    system
        .state_manager()
        .add_listener(StateTopic::EmergencyStop, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

    let outcome = system
        .emergency_stop(StopTrigger::PerformanceThreshold, 1.0, json!({}))
        .await;

    assert!(outcome.executed());
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(system.status(), IntegrationStatus::EmergencyStop);
}

#[tokio::test]
async fn unknown_state_name_repairs_to_error() {
    let system = booted_system().await;
    system
        .state_manager()
        .change_state_named("exploded", "host typo", json!({}));

    assert_eq!(system.state_manager().current_state(), SystemState::Error);
    assert_eq!(system.status(), IntegrationStatus::Error);
}

#[tokio::test]
async fn config_file_drives_the_system() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("governor.toml");
    fs::write(
        &path,
        r#"
        [capacity]
        normal_wip_limit = 1
        temporary_wip_limit = 2

        [hysteresis]
        window_size = 2
        "#,
    )
    .unwrap();

    let config = GovernorConfig::load(Some(&path)).unwrap();
    let system = booted_with(config).await;
    assert_eq!(system.capacity().wip_limit(), 1);

    system
        .emergency_stop(StopTrigger::EquivalenceViolation, 0.5, json!({}))
        .await;
    let second = system
        .emergency_stop(StopTrigger::EquivalenceViolation, 0.5, json!({}))
        .await;
    assert!(second.executed());
}

#[tokio::test]
async fn golden_set_gate_through_the_system() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("cases")).unwrap();
    fs::write(dir.path().join("cases/login.json"), br#"{"user":"a"}"#).unwrap();
    let expected = hash_golden_set(dir.path()).unwrap();

    let mut config = GovernorConfig::default();
    config.equivalence.golden_set_path = Some(dir.path().to_path_buf());
    let system = booted_with(config).await;

    let ok = system.equivalence().verify_golden_set_integrity(&expected);
    assert!(ok.can_proceed);
    assert_eq!(ok.status_code, STATUS_OK);

    fs::write(dir.path().join("cases/login.json"), br#"{"user":"b"}"#).unwrap();
    let drifted = system.equivalence().verify_golden_set_integrity(&expected);
    assert!(!drifted.can_proceed);
    assert_eq!(drifted.status_code, STATUS_UNPROCESSABLE);
}
