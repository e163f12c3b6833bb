//! Property tests: metric updates are repaired into range, never rejected.

use maple_governor_state::{
    parse_state_lenient, sanitize_count, sanitize_unit, MetricsUpdate, StateManager, WorkloadLevel,
};
use maple_governor_types::SystemState;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn arb_raw_score() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => -10.0f64..10.0,
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
    ]
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn unit_scores_land_in_range(raw in arb_raw_score()) {
        let sanitized = sanitize_unit(raw);
        let value = *sanitized.value();
        prop_assert!((0.0..=1.0).contains(&value));
        if (0.0..=1.0).contains(&raw) {
            prop_assert_eq!(value, raw);
            prop_assert!(sanitized.repair_reason().is_none());
        }
    }

    #[test]
    fn negative_counts_become_zero(raw in i64::MIN..0) {
        let sanitized = sanitize_count(raw);
        prop_assert_eq!(*sanitized.value(), 0);
        prop_assert!(sanitized.repair_reason().is_some());
    }

    #[test]
    fn in_range_counts_pass_through(raw in 0i64..=u32::MAX as i64) {
        let sanitized = sanitize_count(raw);
        prop_assert_eq!(*sanitized.value() as i64, raw);
        prop_assert!(sanitized.repair_reason().is_none());
    }

    #[test]
    fn manager_metrics_always_valid(
        wip in -50i64..50,
        safety in arb_raw_score(),
        equivalence in arb_raw_score(),
        utilization in arb_raw_score(),
    ) {
        let manager = StateManager::new();
        let report = manager.update_metrics(
            MetricsUpdate::new()
                .current_wip(wip)
                .safety_score(safety)
                .equivalence_score(equivalence)
                .capacity_utilization(utilization),
        );

        let metrics = manager.metrics();
        prop_assert_eq!(metrics.current_wip as i64, wip.max(0));
        for score in [metrics.safety_score, metrics.equivalence_score] {
            prop_assert!((0.0..=1.0).contains(&score));
        }
        prop_assert!(metrics.capacity_utilization.is_finite());
        prop_assert!(metrics.capacity_utilization >= 0.0);
        if utilization.is_finite() && utilization >= 0.0 {
            prop_assert_eq!(metrics.capacity_utilization, utilization);
        }
        prop_assert_eq!(report.metrics.current_wip, metrics.current_wip);
    }

    #[test]
    fn known_workload_names_parse_in_any_case(
        name in prop_oneof![
            Just("idle"),
            Just("light"),
            Just("moderate"),
            Just("heavy"),
            Just("overloaded"),
        ],
        upper in any::<bool>(),
    ) {
        let raw = if upper { name.to_uppercase() } else { name.to_string() };
        let parsed = WorkloadLevel::parse_lenient(&raw);
        prop_assert!(!parsed.is_repaired());
        prop_assert_eq!(parsed.value().to_string(), name);
    }

    #[test]
    fn unknown_workload_names_repair_to_idle(raw in "zz[a-z]{0,10}") {
        let parsed = WorkloadLevel::parse_lenient(&raw);
        prop_assert!(parsed.is_repaired());
        prop_assert_eq!(*parsed.value(), WorkloadLevel::Idle);
    }

    #[test]
    fn unknown_state_names_repair_to_error(raw in "zz[a-z]{4,12}") {
        prop_assert_eq!(*parse_state_lenient(&raw).value(), SystemState::Error);
    }
}
