//! Emergency-stop triggers and policies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal class that asked for an emergency stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopTrigger {
    EquivalenceViolation,
    ObservabilityMissing,
    PerformanceThreshold,
}

impl StopTrigger {
    pub const ALL: [StopTrigger; 3] = [
        StopTrigger::EquivalenceViolation,
        StopTrigger::ObservabilityMissing,
        StopTrigger::PerformanceThreshold,
    ];

    /// How this signal class is normally handled.
    ///
    /// Informational only: published with stop notifications for audit.
    /// Enforcement resolves the policy from trigger and severity.
    pub fn nominal_policy(&self) -> StopPolicy {
        match self {
            StopTrigger::EquivalenceViolation => StopPolicy::Hysteresis,
            StopTrigger::PerformanceThreshold => StopPolicy::Immediate,
            StopTrigger::ObservabilityMissing => StopPolicy::Gradual,
        }
    }
}

impl fmt::Display for StopTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopTrigger::EquivalenceViolation => "equivalence_violation",
            StopTrigger::ObservabilityMissing => "observability_missing",
            StopTrigger::PerformanceThreshold => "performance_threshold",
        };
        write!(f, "{}", s)
    }
}

/// How an emergency stop is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicy {
    /// Hard stop right away.
    Immediate,
    /// Degrade to a conservative fallback without a full stop.
    Gradual,
    /// Hard stop once the violation persists across the hysteresis window.
    Hysteresis,
}

impl StopPolicy {
    /// Conflict-resolution rank: a higher rank replaces an active lower one.
    pub fn priority(&self) -> u8 {
        match self {
            StopPolicy::Immediate => 3,
            StopPolicy::Hysteresis => 2,
            StopPolicy::Gradual => 1,
        }
    }

    /// Whether executing this policy is a full stop.
    pub fn is_hard_stop(&self) -> bool {
        matches!(self, StopPolicy::Immediate | StopPolicy::Hysteresis)
    }
}

impl fmt::Display for StopPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopPolicy::Immediate => "immediate",
            StopPolicy::Gradual => "gradual",
            StopPolicy::Hysteresis => "hysteresis",
        };
        write!(f, "{}", s)
    }
}
