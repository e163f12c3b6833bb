//! Graded levels used in reports and classifications.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate level of a safety check.
///
/// Variants are ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    Critical,
    High,
    Medium,
    Low,
    Safe,
}

impl SafetyLevel {
    pub fn is_critical(&self) -> bool {
        matches!(self, SafetyLevel::Critical)
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyLevel::Safe)
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SafetyLevel::Critical => "critical",
            SafetyLevel::High => "high",
            SafetyLevel::Medium => "medium",
            SafetyLevel::Low => "low",
            SafetyLevel::Safe => "safe",
        };
        write!(f, "{}", s)
    }
}

/// Equivalence bucket for a single validation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquivalenceLevel {
    Exact,
    High,
    Medium,
    Low,
    Insufficient,
}

impl fmt::Display for EquivalenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EquivalenceLevel::Exact => "exact",
            EquivalenceLevel::High => "high",
            EquivalenceLevel::Medium => "medium",
            EquivalenceLevel::Low => "low",
            EquivalenceLevel::Insufficient => "insufficient",
        };
        write!(f, "{}", s)
    }
}

/// Health of a single component in a health check.
///
/// Ordered so that `max` yields the worst status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentHealth {
    Healthy,
    Degraded,
    Critical,
}

impl ComponentHealth {
    /// Worst status of a set of components; `Healthy` for an empty set.
    pub fn worst<I>(statuses: I) -> ComponentHealth
    where
        I: IntoIterator<Item = ComponentHealth>,
    {
        statuses
            .into_iter()
            .max()
            .unwrap_or(ComponentHealth::Healthy)
    }
}

impl fmt::Display for ComponentHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentHealth::Healthy => write!(f, "healthy"),
            ComponentHealth::Degraded => write!(f, "degraded"),
            ComponentHealth::Critical => write!(f, "critical"),
        }
    }
}
