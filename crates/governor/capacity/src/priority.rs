//! Work-item priority scoring.

use chrono::{DateTime, Utc};
use maple_governor_types::WorkItem;
use serde::{Deserialize, Serialize};

/// Multiplier for items that have blockers. Replaces the dependency
/// multiplier rather than stacking with it.
pub const BLOCKER_WEIGHT: f64 = 1.3;

/// Multiplier for items that have dependencies.
pub const DEPENDENCY_WEIGHT: f64 = 1.1;

/// A priority score, recomputed whenever priorities are refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityScore {
    /// (risk x impact) / workload, 0 for zero workload.
    pub base: f64,
    pub slo_weight: f64,
    pub dependency_weight: f64,
    pub final_score: f64,
    pub calculated_at: DateTime<Utc>,
}

impl PriorityScore {
    pub fn compute(item: &WorkItem) -> Self {
        let base = if item.estimated_workload == 0 {
            0.0
        } else {
            (item.risk as f64 * item.impact as f64) / item.estimated_workload as f64
        };
        let slo_weight = item.priority.slo_weight();
        let dependency_weight = dependency_weight(item);

        Self {
            base,
            slo_weight,
            dependency_weight,
            final_score: base * slo_weight * dependency_weight,
            calculated_at: Utc::now(),
        }
    }
}

pub fn dependency_weight(item: &WorkItem) -> f64 {
    if !item.blockers.is_empty() {
        BLOCKER_WEIGHT
    } else if !item.dependencies.is_empty() {
        DEPENDENCY_WEIGHT
    } else {
        1.0
    }
}
