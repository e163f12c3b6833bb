//! End-to-end test: emergency-stop policy resolution.
//!
//! Covers the hysteresis window, repeat suppression, priority escalation and
//! the post-stop warmup.

use std::time::Duration;

use maple_governor_integration::StopDecision;
use maple_governor_state::StateTopic;
use maple_governor_tests::booted_system;
use maple_governor_types::{IntegrationStatus, StopPolicy, StopTrigger, SystemState};
use serde_json::json;
use tokio::time::advance;

#[tokio::test(start_paused = true)]
async fn hysteresis_fires_on_third_violation() {
    let system = booted_system().await;

    for (i, severity) in [0.4, 0.5, 0.6].into_iter().enumerate() {
        let outcome = system
            .emergency_stop(StopTrigger::EquivalenceViolation, severity, json!({ "sample": i }))
            .await;

        if i < 2 {
            assert_eq!(
                outcome.decision(),
                &StopDecision::PendingHysteresis {
                    violations: i + 1,
                    required: 3
                }
            );
            assert_ne!(system.status(), IntegrationStatus::EmergencyStop);
        } else {
            assert!(outcome.executed());
            assert_eq!(outcome.record.policy, StopPolicy::Hysteresis);
        }
        advance(Duration::from_secs(10)).await;
    }

    assert_eq!(system.status(), IntegrationStatus::EmergencyStop);
    assert_eq!(system.active_policy(), Some(StopPolicy::Hysteresis));
    assert!(system.check_emergency_stop_conditions().should_trigger);
    assert_eq!(
        system.state_manager().current_state(),
        SystemState::EmergencyStop
    );
}

#[tokio::test(start_paused = true)]
async fn violations_outside_the_span_do_not_accumulate() {
    let system = booted_system().await;

    for _ in 0..3 {
        let outcome = system
            .emergency_stop(StopTrigger::PerformanceThreshold, 0.5, json!({}))
            .await;
        assert!(!outcome.executed());
        advance(Duration::from_secs(100)).await;
    }

    assert_ne!(system.status(), IntegrationStatus::EmergencyStop);
}

#[tokio::test(start_paused = true)]
async fn repeated_request_executes_once() {
    let system = booted_system().await;

    let first = system
        .emergency_stop(StopTrigger::ObservabilityMissing, 0.5, json!({ "source": "metrics" }))
        .await;
    advance(Duration::from_secs(30)).await;
    let second = system
        .emergency_stop(StopTrigger::ObservabilityMissing, 0.55, json!({ "source": "metrics" }))
        .await;

    assert!(first.executed());
    assert_eq!(second.decision(), &StopDecision::Duplicate);

    let executed = system
        .get_emergency_stop_history(None)
        .iter()
        .filter(|r| r.executed())
        .count();
    assert_eq!(executed, 1);
    assert_eq!(system.get_emergency_stop_history(None).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn repeat_across_a_policy_boundary_executes_once() {
    let system = booted_system().await;

    for _ in 0..3 {
        system
            .emergency_stop(StopTrigger::PerformanceThreshold, 0.75, json!({ "p99_ms": 750 }))
            .await;
        advance(Duration::from_secs(5)).await;
    }
    assert_eq!(system.active_policy(), Some(StopPolicy::Hysteresis));

    // 0.82 resolves to Immediate, but it is the same incident.
    let repeat = system
        .emergency_stop(StopTrigger::PerformanceThreshold, 0.82, json!({ "p99_ms": 820 }))
        .await;

    assert_eq!(repeat.decision(), &StopDecision::Duplicate);
    assert_eq!(repeat.record.policy, StopPolicy::Immediate);
    assert_eq!(system.active_policy(), Some(StopPolicy::Hysteresis));
    assert_eq!(system.emergency_stop_count(), 1);
    let executed = system
        .get_emergency_stop_history(None)
        .iter()
        .filter(|r| r.executed())
        .count();
    assert_eq!(executed, 1);
}

#[tokio::test(start_paused = true)]
async fn distant_severity_is_not_a_repeat() {
    let system = booted_system().await;

    system
        .emergency_stop(StopTrigger::ObservabilityMissing, 0.2, json!({}))
        .await;
    let second = system
        .emergency_stop(StopTrigger::ObservabilityMissing, 0.6, json!({}))
        .await;

    assert_eq!(
        second.decision(),
        &StopDecision::ActivePolicyHolds {
            active: StopPolicy::Gradual
        }
    );
}

#[tokio::test(start_paused = true)]
async fn immediate_replaces_active_hysteresis() {
    let system = booted_system().await;
    for _ in 0..3 {
        system
            .emergency_stop(StopTrigger::EquivalenceViolation, 0.5, json!({}))
            .await;
    }
    assert_eq!(system.active_policy(), Some(StopPolicy::Hysteresis));

    let escalation = system
        .emergency_stop(StopTrigger::PerformanceThreshold, 0.9, json!({ "p99_ms": 900 }))
        .await;

    assert!(escalation.executed());
    assert_eq!(escalation.active_policy, Some(StopPolicy::Immediate));
    assert_eq!(system.active_policy(), Some(StopPolicy::Immediate));
    assert_eq!(system.emergency_stop_count(), 2);

    let lower = system
        .emergency_stop(StopTrigger::ObservabilityMissing, 1.0, json!({}))
        .await;
    assert_eq!(
        lower.decision(),
        &StopDecision::ActivePolicyHolds {
            active: StopPolicy::Immediate
        }
    );
}

#[tokio::test(start_paused = true)]
async fn hard_stop_escalates_from_gradual_fallback() {
    let system = booted_system().await;
    system
        .emergency_stop(StopTrigger::ObservabilityMissing, 0.5, json!({}))
        .await;
    assert_eq!(system.status(), IntegrationStatus::Warning);

    let outcome = system
        .emergency_stop(StopTrigger::EquivalenceViolation, 0.95, json!({}))
        .await;
    assert!(outcome.executed());
    assert_eq!(system.status(), IntegrationStatus::EmergencyStop);
    assert_eq!(system.active_policy(), Some(StopPolicy::Immediate));
}

#[tokio::test(start_paused = true)]
async fn warmup_suppresses_the_same_trigger() {
    let system = booted_system().await;
    for _ in 0..3 {
        system
            .emergency_stop(StopTrigger::EquivalenceViolation, 0.5, json!({}))
            .await;
    }
    assert_eq!(system.status(), IntegrationStatus::EmergencyStop);

    advance(Duration::from_secs(5)).await;
    let during = system
        .emergency_stop(StopTrigger::EquivalenceViolation, 0.3, json!({}))
        .await;
    match during.decision() {
        StopDecision::WarmupActive { remaining } => {
            assert_eq!(*remaining, Duration::from_secs(55));
        }
        other => panic!("expected warmup suppression, got {:?}", other),
    }

    advance(Duration::from_secs(60)).await;
    let report = system.recover_from_emergency_stop("warmup elapsed").await;
    assert!(report.recovered);

    // The violation seen during warmup still counts toward the window.
    let first = system
        .emergency_stop(StopTrigger::EquivalenceViolation, 0.3, json!({}))
        .await;
    assert_eq!(
        first.decision(),
        &StopDecision::PendingHysteresis {
            violations: 2,
            required: 3
        }
    );
    let second = system
        .emergency_stop(StopTrigger::EquivalenceViolation, 0.3, json!({}))
        .await;
    assert!(second.executed());
    assert_eq!(system.status(), IntegrationStatus::EmergencyStop);
}

#[tokio::test]
async fn hard_stop_publishes_one_notice_with_context() {
    let system = booted_system().await;
    let mut events = system.state_manager().subscribe();

    system
        .emergency_stop(StopTrigger::PerformanceThreshold, 0.85, json!({ "p99_ms": 1200 }))
        .await;

    let mut notices = Vec::new();
    while let Ok(event) = events.try_recv() {
        if event.topic() == StateTopic::EmergencyStop {
            notices.push(event);
        }
    }
    assert_eq!(notices.len(), 1);
    match &notices[0] {
        maple_governor_state::StateEvent::EmergencyStop(notice) => {
            assert_eq!(notice.trigger, Some(StopTrigger::PerformanceThreshold));
            assert_eq!(notice.policy, Some(StopPolicy::Immediate));
            assert!((notice.severity - 0.85).abs() < 1e-9);
            assert_eq!(notice.routing.len(), 3);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn out_of_range_severity_is_clamped() {
    let system = booted_system().await;
    let outcome = system
        .emergency_stop(StopTrigger::EquivalenceViolation, 7.5, json!({}))
        .await;
    assert_eq!(outcome.record.severity, 1.0);
    assert_eq!(outcome.record.policy, StopPolicy::Immediate);
}
