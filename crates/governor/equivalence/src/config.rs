//! Equivalence thresholds and golden-set location.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{EquivalenceError, EquivalenceResult};

/// Equivalence validator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EquivalenceConfig {
    pub exact_threshold: f64,
    pub high_threshold: f64,
    /// Also the success threshold of a single validation.
    pub medium_threshold: f64,
    pub low_threshold: f64,

    /// Weight of critical cases in the aggregate score.
    pub critical_weight: f64,

    /// Aggregate score below which the orchestrator treats equivalence as
    /// violated.
    pub equivalence_threshold: f64,

    /// Root of the golden fixture tree.
    pub golden_set_path: Option<PathBuf>,
}

impl Default for EquivalenceConfig {
    fn default() -> Self {
        Self {
            exact_threshold: 0.999,
            high_threshold: 0.95,
            medium_threshold: 0.8,
            low_threshold: 0.6,
            critical_weight: 0.7,
            equivalence_threshold: 0.995,
            golden_set_path: None,
        }
    }
}

impl EquivalenceConfig {
    pub fn validate(&self) -> EquivalenceResult<()> {
        let buckets = [
            self.exact_threshold,
            self.high_threshold,
            self.medium_threshold,
            self.low_threshold,
        ];
        if buckets.iter().any(|t| !(0.0..=1.0).contains(t)) {
            return Err(EquivalenceError::InvalidConfig(
                "bucket thresholds must lie within [0, 1]".into(),
            ));
        }
        if buckets.windows(2).any(|w| w[0] <= w[1]) {
            return Err(EquivalenceError::InvalidConfig(format!(
                "bucket thresholds must be strictly descending, got {:?}",
                buckets
            )));
        }
        if !(0.0..=1.0).contains(&self.critical_weight) {
            return Err(EquivalenceError::InvalidConfig(format!(
                "critical weight {} must lie within [0, 1]",
                self.critical_weight
            )));
        }
        if !(0.0..=1.0).contains(&self.equivalence_threshold) {
            return Err(EquivalenceError::InvalidConfig(format!(
                "equivalence threshold {} must lie within [0, 1]",
                self.equivalence_threshold
            )));
        }
        Ok(())
    }
}
