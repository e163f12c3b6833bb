//! Structured results returned by the integrated safety system.

use chrono::{DateTime, Utc};
use maple_governor_capacity::{CapacityLimits, CapacityReport};
use maple_governor_equivalence::{EquivalenceMetrics, EquivalenceReport};
use maple_governor_safety::{SafetyCheck, SafetyReport};
use maple_governor_state::SystemMetrics;
use maple_governor_types::{ComponentHealth, IntegrationStatus, StopPolicy, StopTrigger};
use serde::{Deserialize, Serialize};

use crate::hysteresis::TriggerWindowStatus;
use crate::policy::{EmergencyStopOutcome, EmergencyStopRecord};

/// Audit record of one integration check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationCheckpoint {
    pub timestamp: DateTime<Utc>,
    pub status: IntegrationStatus,
    pub safety: SafetyCheck,
    pub capacity: CapacityLimits,
    pub equivalence: EquivalenceMetrics,
    /// Stop requests raised by this check, in evaluation order.
    pub stops: Vec<EmergencyStopOutcome>,
    pub composite_score: f64,
}

impl IntegrationCheckpoint {
    pub fn stop_executed(&self) -> bool {
        self.stops.iter().any(EmergencyStopOutcome::executed)
    }
}

/// Result of `recover_from_emergency_stop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub recovered: bool,
    pub status: IntegrationStatus,
    pub message: String,
    /// Triggers whose warmup held recovery back.
    pub blocking_triggers: Vec<StopTrigger>,
    /// Confirmation check run after a successful recovery.
    pub checkpoint: Option<IntegrationCheckpoint>,
}

/// Result of `check_emergency_stop_conditions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopConditions {
    /// A stop is active, or some trigger's hysteresis window is full.
    pub should_trigger: bool,
    pub reasons: Vec<String>,
    pub status: IntegrationStatus,
    pub active_policy: Option<StopPolicy>,
    pub windows: Vec<TriggerWindowStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub component: String,
    pub health: ComponentHealth,
    pub detail: String,
}

/// Result of `health_check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Worst component health.
    pub overall: ComponentHealth,
    pub status: IntegrationStatus,
    pub components: Vec<ComponentStatus>,
    pub windows: Vec<TriggerWindowStatus>,
    pub timestamp: DateTime<Utc>,
}

/// Everything the integrated system knows, in one read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationReport {
    pub status: IntegrationStatus,
    pub active_policy: Option<StopPolicy>,
    pub fallback_active: bool,
    pub emergency_stop_count: u32,
    pub health: HealthReport,
    pub safety: SafetyReport,
    pub capacity: CapacityReport,
    pub equivalence: EquivalenceReport,
    pub state_metrics: SystemMetrics,
    pub recent_stops: Vec<EmergencyStopRecord>,
    pub last_checkpoint: Option<IntegrationCheckpoint>,
    pub timestamp: DateTime<Utc>,
}
