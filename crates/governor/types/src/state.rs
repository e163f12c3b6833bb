//! System and integration state machines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Authoritative state of the governed system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    Initializing,
    Ready,
    Running,
    Warning,
    Error,
    EmergencyStop,
    SafeMode,
}

impl SystemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemState::Initializing => "initializing",
            SystemState::Ready => "ready",
            SystemState::Running => "running",
            SystemState::Warning => "warning",
            SystemState::Error => "error",
            SystemState::EmergencyStop => "emergency_stop",
            SystemState::SafeMode => "safe_mode",
        }
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SystemState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "initializing" => Ok(SystemState::Initializing),
            "ready" => Ok(SystemState::Ready),
            "running" => Ok(SystemState::Running),
            "warning" => Ok(SystemState::Warning),
            "error" => Ok(SystemState::Error),
            "emergency_stop" => Ok(SystemState::EmergencyStop),
            "safe_mode" => Ok(SystemState::SafeMode),
            other => Err(format!("unknown system state: {}", other)),
        }
    }
}

/// Status of the integrated safety system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    Initializing,
    Ready,
    Running,
    Warning,
    Error,
    EmergencyStop,
}

impl IntegrationStatus {
    pub fn is_stopped(&self) -> bool {
        matches!(self, IntegrationStatus::EmergencyStop)
    }

    /// The system state this status is published as.
    pub fn as_system_state(&self) -> SystemState {
        match self {
            IntegrationStatus::Initializing => SystemState::Initializing,
            IntegrationStatus::Ready => SystemState::Ready,
            IntegrationStatus::Running => SystemState::Running,
            IntegrationStatus::Warning => SystemState::Warning,
            IntegrationStatus::Error => SystemState::Error,
            IntegrationStatus::EmergencyStop => SystemState::EmergencyStop,
        }
    }

    /// The integration status a system state maps onto. Safe mode is a
    /// degraded-but-running posture and surfaces as `Warning`.
    pub fn from_system_state(state: SystemState) -> Self {
        match state {
            SystemState::Initializing => IntegrationStatus::Initializing,
            SystemState::Ready => IntegrationStatus::Ready,
            SystemState::Running => IntegrationStatus::Running,
            SystemState::Warning | SystemState::SafeMode => IntegrationStatus::Warning,
            SystemState::Error => IntegrationStatus::Error,
            SystemState::EmergencyStop => IntegrationStatus::EmergencyStop,
        }
    }
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_system_state())
    }
}
