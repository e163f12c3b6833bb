//! System metrics and the repair-not-reject setters that feed them.
//!
//! Metric updates arrive from several components and from hosts. A bad value
//! must never stall the control plane, so every field goes through a
//! sanitizer that either accepts it or replaces it with the nearest safe
//! value and says why.

use chrono::{DateTime, Utc};
use maple_governor_types::SystemState;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A value that passed validation, or the repaired value that replaced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Sanitized<T> {
    Valid(T),
    Repaired { value: T, reason: String },
}

impl<T> Sanitized<T> {
    pub fn value(&self) -> &T {
        match self {
            Sanitized::Valid(v) => v,
            Sanitized::Repaired { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Sanitized::Valid(v) => v,
            Sanitized::Repaired { value, .. } => value,
        }
    }

    pub fn is_repaired(&self) -> bool {
        matches!(self, Sanitized::Repaired { .. })
    }

    pub fn repair_reason(&self) -> Option<&str> {
        match self {
            Sanitized::Valid(_) => None,
            Sanitized::Repaired { reason, .. } => Some(reason),
        }
    }
}

/// Counts (WIP, limits, stop counters): negatives become zero.
pub fn sanitize_count(raw: i64) -> Sanitized<u32> {
    if raw < 0 {
        Sanitized::Repaired {
            value: 0,
            reason: format!("negative count {} repaired to 0", raw),
        }
    } else if raw > u32::MAX as i64 {
        Sanitized::Repaired {
            value: u32::MAX,
            reason: format!("count {} saturated to {}", raw, u32::MAX),
        }
    } else {
        Sanitized::Valid(raw as u32)
    }
}

/// Scores: clamped into [0, 1]. Non-finite input becomes 0.0, the
/// conservative reading.
pub fn sanitize_unit(raw: f64) -> Sanitized<f64> {
    if !raw.is_finite() {
        return Sanitized::Repaired {
            value: 0.0,
            reason: format!("non-finite value {} repaired to 0.0", raw),
        };
    }
    let clamped = raw.clamp(0.0, 1.0);
    if clamped != raw {
        Sanitized::Repaired {
            value: clamped,
            reason: format!("value {} clamped to {}", raw, clamped),
        }
    } else {
        Sanitized::Valid(raw)
    }
}

/// Load ratios such as WIP utilisation: non-negative and finite, but allowed
/// above 1.0 so an overloaded system still reads as overloaded.
pub fn sanitize_ratio(raw: f64) -> Sanitized<f64> {
    if !raw.is_finite() {
        return Sanitized::Repaired {
            value: 0.0,
            reason: format!("non-finite ratio {} repaired to 0.0", raw),
        };
    }
    if raw < 0.0 {
        return Sanitized::Repaired {
            value: 0.0,
            reason: format!("negative ratio {} repaired to 0.0", raw),
        };
    }
    Sanitized::Valid(raw)
}

/// Parse a state name, repairing unknown names to `Error`.
pub fn parse_state_lenient(raw: &str) -> Sanitized<SystemState> {
    match raw.parse::<SystemState>() {
        Ok(state) => Sanitized::Valid(state),
        Err(_) => Sanitized::Repaired {
            value: SystemState::Error,
            reason: format!("unknown system state '{}' repaired to error", raw),
        },
    }
}

/// Coarse load level of the governed system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadLevel {
    #[default]
    Idle,
    Light,
    Moderate,
    Heavy,
    Overloaded,
}

impl WorkloadLevel {
    /// Parse a level, repairing unknown names to `Idle`.
    pub fn parse_lenient(raw: &str) -> Sanitized<WorkloadLevel> {
        match raw.parse::<WorkloadLevel>() {
            Ok(level) => Sanitized::Valid(level),
            Err(_) => Sanitized::Repaired {
                value: WorkloadLevel::Idle,
                reason: format!("unknown workload level '{}' repaired to idle", raw),
            },
        }
    }

    /// Level implied by WIP utilisation.
    pub fn from_utilization(utilization: f64) -> WorkloadLevel {
        if utilization <= 0.0 {
            WorkloadLevel::Idle
        } else if utilization < 0.5 {
            WorkloadLevel::Light
        } else if utilization < 0.8 {
            WorkloadLevel::Moderate
        } else if utilization <= 1.0 {
            WorkloadLevel::Heavy
        } else {
            WorkloadLevel::Overloaded
        }
    }
}

impl FromStr for WorkloadLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(WorkloadLevel::Idle),
            "light" => Ok(WorkloadLevel::Light),
            "moderate" => Ok(WorkloadLevel::Moderate),
            "heavy" => Ok(WorkloadLevel::Heavy),
            "overloaded" => Ok(WorkloadLevel::Overloaded),
            other => Err(format!("unknown workload level: {}", other)),
        }
    }
}

impl fmt::Display for WorkloadLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkloadLevel::Idle => "idle",
            WorkloadLevel::Light => "light",
            WorkloadLevel::Moderate => "moderate",
            WorkloadLevel::Heavy => "heavy",
            WorkloadLevel::Overloaded => "overloaded",
        };
        write!(f, "{}", s)
    }
}

/// Consolidated metrics held by the state manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub current_wip: u32,
    pub wip_limit: u32,
    /// Composite safety score, 0-1. Starts at 1.0: no evidence is not a fault.
    pub safety_score: f64,
    /// Aggregate equivalence score, 0-1. Starts at 1.0 for the same reason.
    pub equivalence_score: f64,
    pub capacity_utilization: f64,
    pub workload_level: WorkloadLevel,
    pub emergency_stop_count: u32,
    /// Equivalence snapshot fields, merged key by key.
    pub equivalence: Map<String, Value>,
    pub last_update: Option<DateTime<Utc>>,
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self {
            current_wip: 0,
            wip_limit: 2,
            safety_score: 1.0,
            equivalence_score: 1.0,
            capacity_utilization: 0.0,
            workload_level: WorkloadLevel::Idle,
            emergency_stop_count: 0,
            equivalence: Map::new(),
            last_update: None,
        }
    }
}

/// Partial metrics update. Unset fields are left alone.
///
/// Fields are deliberately wide (`i64`, `f64`, `String`) so out-of-range
/// input reaches the sanitizers instead of failing at the call site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsUpdate {
    pub current_wip: Option<i64>,
    pub wip_limit: Option<i64>,
    pub safety_score: Option<f64>,
    pub equivalence_score: Option<f64>,
    pub capacity_utilization: Option<f64>,
    pub workload_level: Option<String>,
    pub emergency_stop_count: Option<i64>,
}

impl MetricsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_wip(mut self, wip: i64) -> Self {
        self.current_wip = Some(wip);
        self
    }

    pub fn wip_limit(mut self, limit: i64) -> Self {
        self.wip_limit = Some(limit);
        self
    }

    pub fn safety_score(mut self, score: f64) -> Self {
        self.safety_score = Some(score);
        self
    }

    pub fn equivalence_score(mut self, score: f64) -> Self {
        self.equivalence_score = Some(score);
        self
    }

    pub fn capacity_utilization(mut self, utilization: f64) -> Self {
        self.capacity_utilization = Some(utilization);
        self
    }

    pub fn workload_level(mut self, level: impl Into<String>) -> Self {
        self.workload_level = Some(level.into());
        self
    }

    pub fn emergency_stop_count(mut self, count: i64) -> Self {
        self.emergency_stop_count = Some(count);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.current_wip.is_none()
            && self.wip_limit.is_none()
            && self.safety_score.is_none()
            && self.equivalence_score.is_none()
            && self.capacity_utilization.is_none()
            && self.workload_level.is_none()
            && self.emergency_stop_count.is_none()
    }
}

/// One field that was repaired during an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRepair {
    pub field: String,
    pub reason: String,
}

/// Result of applying a metrics update.
#[derive(Debug, Clone)]
pub struct MetricsUpdateReport {
    pub metrics: SystemMetrics,
    pub repairs: Vec<MetricRepair>,
}

impl MetricsUpdateReport {
    pub fn was_repaired(&self) -> bool {
        !self.repairs.is_empty()
    }
}

impl SystemMetrics {
    /// Apply an update in place, returning the repairs that were needed.
    pub(crate) fn apply(&mut self, update: &MetricsUpdate) -> Vec<MetricRepair> {
        let mut repairs = Vec::new();

        fn take<T>(field: &str, s: Sanitized<T>, repairs: &mut Vec<MetricRepair>) -> T {
            if let Some(reason) = s.repair_reason() {
                repairs.push(MetricRepair {
                    field: field.to_string(),
                    reason: reason.to_string(),
                });
            }
            s.into_value()
        }

        if let Some(raw) = update.current_wip {
            self.current_wip = take("current_wip", sanitize_count(raw), &mut repairs);
        }
        if let Some(raw) = update.wip_limit {
            self.wip_limit = take("wip_limit", sanitize_count(raw), &mut repairs);
        }
        if let Some(raw) = update.safety_score {
            self.safety_score = take("safety_score", sanitize_unit(raw), &mut repairs);
        }
        if let Some(raw) = update.equivalence_score {
            self.equivalence_score = take("equivalence_score", sanitize_unit(raw), &mut repairs);
        }
        if let Some(raw) = update.capacity_utilization {
            self.capacity_utilization =
                take("capacity_utilization", sanitize_ratio(raw), &mut repairs);
        }
        if let Some(raw) = &update.workload_level {
            self.workload_level =
                take("workload_level", WorkloadLevel::parse_lenient(raw), &mut repairs);
        }
        if let Some(raw) = update.emergency_stop_count {
            self.emergency_stop_count =
                take("emergency_stop_count", sanitize_count(raw), &mut repairs);
        }

        repairs
    }
}
