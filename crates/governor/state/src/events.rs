//! State events and listener bookkeeping.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use maple_governor_types::{StopPolicy, StopTrigger, SystemState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metrics::SystemMetrics;

/// Topics a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateTopic {
    StateChange,
    MetricsUpdate,
    EmergencyStop,
    SafeModeEnter,
    SafeModeExit,
}

impl fmt::Display for StateTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StateTopic::StateChange => "state_change",
            StateTopic::MetricsUpdate => "metrics_update",
            StateTopic::EmergencyStop => "emergency_stop",
            StateTopic::SafeModeEnter => "safe_mode_enter",
            StateTopic::SafeModeExit => "safe_mode_exit",
        };
        write!(f, "{}", s)
    }
}

/// One entry of the append-only transition history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: SystemState,
    pub to: SystemState,
    pub reason: String,
    pub metadata: Value,
    pub timestamp: DateTime<Utc>,
}

/// Payload of an emergency-stop notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyStopNotice {
    pub trigger: Option<StopTrigger>,
    pub policy: Option<StopPolicy>,
    pub severity: f64,
    pub reason: String,
    pub details: Value,
    /// How each signal class is normally handled. Audit context only.
    pub routing: BTreeMap<StopTrigger, StopPolicy>,
    pub timestamp: DateTime<Utc>,
}

impl EmergencyStopNotice {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            trigger: None,
            policy: None,
            severity: 1.0,
            reason: reason.into(),
            details: Value::Null,
            routing: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_trigger(mut self, trigger: StopTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn with_policy(mut self, policy: StopPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_severity(mut self, severity: f64) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// The fixed informational routing table attached to stop notifications.
pub fn nominal_routing() -> BTreeMap<StopTrigger, StopPolicy> {
    StopTrigger::ALL
        .iter()
        .map(|t| (*t, t.nominal_policy()))
        .collect()
}

/// Events emitted by the state manager.
#[derive(Debug, Clone)]
pub enum StateEvent {
    StateChanged(StateTransition),
    MetricsUpdated(Box<SystemMetrics>),
    EmergencyStop(Box<EmergencyStopNotice>),
    SafeModeEntered(StateTransition),
    SafeModeExited(StateTransition),
}

impl StateEvent {
    pub fn topic(&self) -> StateTopic {
        match self {
            StateEvent::StateChanged(_) => StateTopic::StateChange,
            StateEvent::MetricsUpdated(_) => StateTopic::MetricsUpdate,
            StateEvent::EmergencyStop(_) => StateTopic::EmergencyStop,
            StateEvent::SafeModeEntered(_) => StateTopic::SafeModeEnter,
            StateEvent::SafeModeExited(_) => StateTopic::SafeModeExit,
        }
    }
}

/// Handle returned by listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Listener callback. Errors and panics are contained per listener.
pub type Listener = Arc<dyn Fn(&StateEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct ListenerEntry {
    pub id: ListenerId,
    pub topic: StateTopic,
    pub callback: Listener,
}
