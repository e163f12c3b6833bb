//! Property tests: equivalence buckets and work-item priorities move in the
//! same direction as their inputs.

use maple_governor_capacity::PriorityScore;
use maple_governor_equivalence::{bucket, score_structural, text_similarity, EquivalenceConfig};
use maple_governor_types::{EquivalenceLevel, PriorityLevel, WorkItem, WorkItemId};
use proptest::prelude::*;
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn rank(level: EquivalenceLevel) -> u8 {
    match level {
        EquivalenceLevel::Insufficient => 0,
        EquivalenceLevel::Low => 1,
        EquivalenceLevel::Medium => 2,
        EquivalenceLevel::High => 3,
        EquivalenceLevel::Exact => 4,
    }
}

fn arb_priority() -> impl Strategy<Value = PriorityLevel> {
    prop_oneof![
        Just(PriorityLevel::Critical),
        Just(PriorityLevel::High),
        Just(PriorityLevel::Medium),
        Just(PriorityLevel::Low),
    ]
}

fn arb_item() -> impl Strategy<Value = WorkItem> {
    (arb_priority(), 0u8..=10, 1u8..=10, 1u8..=10).prop_map(|(priority, workload, risk, impact)| {
        WorkItem::new("generated", "generated")
            .with_priority(priority)
            .with_estimates(workload, risk, impact)
    })
}

fn arb_object() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z]{1,6}", 0i64..20, 0..8).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn higher_scores_never_land_in_lower_buckets(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let config = EquivalenceConfig::default();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(rank(bucket(low, &config)) <= rank(bucket(high, &config)));
    }

    #[test]
    fn blockers_never_lower_priority(item in arb_item()) {
        let plain = PriorityScore::compute(&item);
        let blocked = PriorityScore::compute(
            &item.clone().with_blockers(vec![WorkItemId::new("blocker")]),
        );
        let dependent = PriorityScore::compute(
            &item.with_dependencies(vec![WorkItemId::new("dep")]),
        );

        prop_assert!(blocked.final_score >= dependent.final_score);
        prop_assert!(dependent.final_score >= plain.final_score);
    }

    #[test]
    fn priority_is_non_negative(item in arb_item()) {
        let score = PriorityScore::compute(&item);
        prop_assert!(score.final_score >= 0.0);
        prop_assert!(score.final_score.is_finite());
    }

    #[test]
    fn structural_score_stays_in_unit_range(expected in arb_object(), actual in arb_object()) {
        let score = score_structural(&Value::Object(expected.clone()), &Value::Object(actual));
        prop_assert!((0.0..=1.0).contains(&score));

        let same = score_structural(&Value::Object(expected.clone()), &Value::Object(expected));
        prop_assert_eq!(same, 1.0);
    }

    #[test]
    fn text_similarity_is_bounded_and_reflexive(a in "[a-z ]{0,24}", b in "[a-z ]{0,24}") {
        let score = text_similarity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&score));
        prop_assert_eq!(text_similarity(&a, &a), 1.0);
    }
}
