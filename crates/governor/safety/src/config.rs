//! Safety framework configuration.

use serde::{Deserialize, Serialize};

use crate::error::{SafetyError, SafetyResult};

/// Configuration for the safety framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Lower bound of the safety score band.
    pub score_floor: f64,

    /// Upper bound of the safety score band.
    pub score_ceiling: f64,

    /// Drift average at or below which critical mode is entered.
    pub critical_enter_threshold: f64,

    /// Drift average at or above which critical mode is left.
    pub critical_exit_threshold: f64,

    /// Minimum composite safety score the orchestrator accepts.
    pub safety_threshold: f64,

    /// Number of check records kept.
    pub history_limit: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            score_floor: 0.0,
            score_ceiling: 1.0,
            critical_enter_threshold: 0.12,
            critical_exit_threshold: 0.16,
            safety_threshold: 0.95,
            history_limit: 100,
        }
    }
}

impl SafetyConfig {
    pub fn validate(&self) -> SafetyResult<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);

        if !in_unit(self.score_floor) || !in_unit(self.score_ceiling) {
            return Err(SafetyError::InvalidConfig(format!(
                "score band [{}, {}] must lie within [0, 1]",
                self.score_floor, self.score_ceiling
            )));
        }
        if self.score_floor > self.score_ceiling {
            return Err(SafetyError::InvalidConfig(format!(
                "score floor {} exceeds ceiling {}",
                self.score_floor, self.score_ceiling
            )));
        }
        if self.critical_enter_threshold >= self.critical_exit_threshold {
            return Err(SafetyError::InvalidConfig(format!(
                "critical enter threshold {} must be below exit threshold {}",
                self.critical_enter_threshold, self.critical_exit_threshold
            )));
        }
        if !in_unit(self.safety_threshold) {
            return Err(SafetyError::InvalidConfig(format!(
                "safety threshold {} must lie within [0, 1]",
                self.safety_threshold
            )));
        }
        if self.history_limit == 0 {
            return Err(SafetyError::InvalidConfig(
                "history limit must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
