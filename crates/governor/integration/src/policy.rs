//! Emergency-stop policy resolution and stop records.

use std::time::Duration;

use chrono::{DateTime, Utc};
use maple_governor_types::{StopPolicy, StopRecordId, StopTrigger};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::StopPolicyConfig;

/// Resolve the policy for a stop request from its trigger and severity.
pub fn resolve_policy(trigger: StopTrigger, severity: f64, config: &StopPolicyConfig) -> StopPolicy {
    match trigger {
        StopTrigger::ObservabilityMissing => StopPolicy::Gradual,
        StopTrigger::EquivalenceViolation if severity >= config.equivalence_immediate_severity => {
            StopPolicy::Immediate
        }
        StopTrigger::PerformanceThreshold if severity >= config.performance_immediate_severity => {
            StopPolicy::Immediate
        }
        _ => StopPolicy::Hysteresis,
    }
}

/// Clamp a severity into [0, 1]. Non-finite input is treated as the worst case.
pub fn sanitize_severity(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// What happened to a stop request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum StopDecision {
    /// The policy was carried out.
    Executed,
    /// Violation recorded; the hysteresis window is not yet full.
    PendingHysteresis { violations: usize, required: usize },
    /// Violation recorded; the trigger is cooling down after a stop.
    WarmupActive { remaining: Duration },
    /// Repeat of a recent executed stop.
    Duplicate,
    /// An active policy of equal or higher priority already holds.
    ActivePolicyHolds { active: StopPolicy },
    /// Execution failed and a hard stop was forced instead.
    FailSafe { error: String },
}

impl StopDecision {
    /// Whether the system changed posture because of this request.
    pub fn took_effect(&self) -> bool {
        matches!(self, StopDecision::Executed | StopDecision::FailSafe { .. })
    }
}

/// Audit record of one stop request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyStopRecord {
    pub id: StopRecordId,
    pub trigger: StopTrigger,
    pub severity: f64,
    pub policy: StopPolicy,
    pub decision: StopDecision,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

impl EmergencyStopRecord {
    pub fn new(
        trigger: StopTrigger,
        severity: f64,
        policy: StopPolicy,
        decision: StopDecision,
        details: Value,
    ) -> Self {
        Self {
            id: StopRecordId::generate(),
            trigger,
            severity,
            policy,
            decision,
            details,
            timestamp: Utc::now(),
        }
    }

    pub fn executed(&self) -> bool {
        self.decision.took_effect()
    }
}

/// Result of `emergency_stop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyStopOutcome {
    pub record: EmergencyStopRecord,
    /// Policy in force after the request.
    pub active_policy: Option<StopPolicy>,
}

impl EmergencyStopOutcome {
    pub fn executed(&self) -> bool {
        self.record.executed()
    }

    pub fn decision(&self) -> &StopDecision {
        &self.record.decision
    }
}
