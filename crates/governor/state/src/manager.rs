//! State Manager - the single source of truth for system state and metrics.
//!
//! One `StateManager` is constructed by the host and shared (`Arc`) with every
//! component that needs to read or publish state. There is no global instance:
//! tests build their own.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use maple_governor_types::SystemState;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::{StateError, StateResult};
use crate::events::{
    nominal_routing, EmergencyStopNotice, Listener, ListenerEntry, ListenerId, StateEvent,
    StateTopic, StateTransition,
};
use crate::metrics::{
    parse_state_lenient, sanitize_unit, MetricRepair, MetricsUpdate, MetricsUpdateReport, SystemMetrics,
};

/// Snapshot field that carries the aggregate equivalence score.
pub const OVERALL_SCORE_KEY: &str = "overall_score";

struct Inner {
    state: SystemState,
    metrics: SystemMetrics,
    history: Vec<StateTransition>,
}

/// Authoritative holder of system state, metrics and the state event bus.
pub struct StateManager {
    inner: RwLock<Inner>,
    listeners: RwLock<Vec<ListenerEntry>>,
    next_listener_id: AtomicU64,
    event_tx: broadcast::Sender<StateEvent>,
}

impl StateManager {
    /// Create a manager in `Initializing` with default metrics.
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(1024);

        Self {
            inner: RwLock::new(Inner {
                state: SystemState::Initializing,
                metrics: SystemMetrics::default(),
                history: Vec::new(),
            }),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            event_tx,
        }
    }

    /// Subscribe to every state event.
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.event_tx.subscribe()
    }

    /// Register a listener for one topic.
    pub fn add_listener<F>(&self, topic: StateTopic, callback: F) -> ListenerId
    where
        F: Fn(&StateEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        let callback: Listener = std::sync::Arc::new(callback);
        self.listeners.write().push(ListenerEntry {
            id,
            topic,
            callback,
        });
        debug!(listener = %id, topic = %topic, "Listener registered");
        id
    }

    /// Remove a previously registered listener.
    pub fn remove_listener(&self, id: ListenerId) -> StateResult<()> {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        if listeners.len() == before {
            return Err(StateError::ListenerNotFound(id));
        }
        Ok(())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn current_state(&self) -> SystemState {
        self.inner.read().state
    }

    pub fn metrics(&self) -> SystemMetrics {
        self.inner.read().metrics.clone()
    }

    /// Transition history, oldest first. `limit` keeps only the newest entries.
    pub fn history(&self, limit: Option<usize>) -> Vec<StateTransition> {
        let inner = self.inner.read();
        match limit {
            Some(n) if n < inner.history.len() => inner.history[inner.history.len() - n..].to_vec(),
            _ => inner.history.clone(),
        }
    }

    /// Record a transition and notify listeners.
    ///
    /// Fires `state_change`, plus `emergency_stop`, `safe_mode_enter` or
    /// `safe_mode_exit` when the transition crosses those states.
    pub fn change_state(
        &self,
        new_state: SystemState,
        reason: impl Into<String>,
        metadata: Value,
    ) -> StateTransition {
        let reason = reason.into();
        let transition = self.transition(new_state, reason.clone(), metadata.clone());

        if new_state == SystemState::EmergencyStop {
            let mut notice = EmergencyStopNotice::new(reason).with_details(metadata);
            notice.routing = nominal_routing();
            self.emit(StateEvent::EmergencyStop(Box::new(notice)));
        }

        transition
    }

    /// `change_state` for hosts that hold the state as text. Unknown names
    /// repair to `Error`.
    pub fn change_state_named(
        &self,
        raw: &str,
        reason: impl Into<String>,
        metadata: Value,
    ) -> StateTransition {
        let parsed = parse_state_lenient(raw);
        if let Some(repair) = parsed.repair_reason() {
            warn!(raw = raw, reason = repair, "System state repaired");
        }
        self.change_state(parsed.into_value(), reason, metadata)
    }

    /// Move to `EmergencyStop` and publish the full stop context.
    pub fn trigger_emergency_stop(&self, mut notice: EmergencyStopNotice) -> StateTransition {
        let metadata = serde_json::json!({
            "trigger": notice.trigger,
            "policy": notice.policy,
            "severity": notice.severity,
        });
        let transition =
            self.transition(SystemState::EmergencyStop, notice.reason.clone(), metadata);

        {
            let mut inner = self.inner.write();
            inner.metrics.emergency_stop_count = inner.metrics.emergency_stop_count.saturating_add(1);
            inner.metrics.last_update = Some(Utc::now());
        }

        notice.routing = nominal_routing();
        error!(
            trigger = ?notice.trigger,
            policy = ?notice.policy,
            severity = notice.severity,
            reason = %notice.reason,
            "Emergency stop published"
        );
        self.emit(StateEvent::EmergencyStop(Box::new(notice)));

        transition
    }

    pub fn enter_safe_mode(&self, reason: impl Into<String>) -> StateTransition {
        self.change_state(SystemState::SafeMode, reason, Value::Null)
    }

    pub fn exit_safe_mode(&self, reason: impl Into<String>) -> StateTransition {
        self.change_state(SystemState::Ready, reason, Value::Null)
    }

    /// Apply a partial metrics update, repairing bad fields instead of
    /// rejecting them.
    pub fn update_metrics(&self, update: MetricsUpdate) -> MetricsUpdateReport {
        let (metrics, repairs) = {
            let mut inner = self.inner.write();
            let repairs = inner.metrics.apply(&update);
            inner.metrics.last_update = Some(Utc::now());
            (inner.metrics.clone(), repairs)
        };

        for repair in &repairs {
            warn!(field = %repair.field, reason = %repair.reason, "Metric repaired");
        }

        self.emit(StateEvent::MetricsUpdated(Box::new(metrics.clone())));

        MetricsUpdateReport { metrics, repairs }
    }

    /// Merge an equivalence snapshot into the metrics.
    ///
    /// Keys absent from the snapshot are kept, and a `null` never overwrites
    /// an existing value. A numeric `overall_score` is also mapped into the
    /// safety and equivalence score fields.
    pub fn publish_equivalence_metrics(&self, snapshot: &Map<String, Value>) -> MetricsUpdateReport {
        let mut repairs = Vec::new();

        let metrics = {
            let mut inner = self.inner.write();
            for (key, value) in snapshot {
                if value.is_null() && inner.metrics.equivalence.contains_key(key) {
                    continue;
                }
                inner.metrics.equivalence.insert(key.clone(), value.clone());
            }

            if let Some(raw) = snapshot.get(OVERALL_SCORE_KEY).and_then(Value::as_f64) {
                let score = sanitize_unit(raw);
                if let Some(reason) = score.repair_reason() {
                    repairs.push(MetricRepair {
                        field: OVERALL_SCORE_KEY.to_string(),
                        reason: reason.to_string(),
                    });
                }
                let score = score.into_value();
                inner.metrics.equivalence_score = score;
                inner.metrics.safety_score = score;
            }

            inner.metrics.last_update = Some(Utc::now());
            inner.metrics.clone()
        };

        for repair in &repairs {
            warn!(field = %repair.field, reason = %repair.reason, "Equivalence metric repaired");
        }
        debug!(keys = snapshot.len(), "Equivalence snapshot merged");

        self.emit(StateEvent::MetricsUpdated(Box::new(metrics.clone())));

        MetricsUpdateReport { metrics, repairs }
    }

    /// Append the transition and emit the state-change family of events,
    /// except `emergency_stop`, which callers emit with their own payload.
    fn transition(&self, new_state: SystemState, reason: String, metadata: Value) -> StateTransition {
        let transition = {
            let mut inner = self.inner.write();
            let transition = StateTransition {
                from: inner.state,
                to: new_state,
                reason,
                metadata,
                timestamp: Utc::now(),
            };
            inner.state = new_state;
            inner.history.push(transition.clone());
            transition
        };

        info!(
            from = %transition.from,
            to = %transition.to,
            reason = %transition.reason,
            "System state changed"
        );

        self.emit(StateEvent::StateChanged(transition.clone()));

        if transition.to == SystemState::SafeMode && transition.from != SystemState::SafeMode {
            self.emit(StateEvent::SafeModeEntered(transition.clone()));
        }
        if transition.from == SystemState::SafeMode && transition.to != SystemState::SafeMode {
            self.emit(StateEvent::SafeModeExited(transition.clone()));
        }

        transition
    }

    /// Deliver an event to the broadcast channel and matching listeners.
    ///
    /// Listeners run outside every lock. A failing or panicking listener is
    /// logged and skipped.
    fn emit(&self, event: StateEvent) {
        let _ = self.event_tx.send(event.clone());

        let topic = event.topic();
        let listeners: Vec<ListenerEntry> = self
            .listeners
            .read()
            .iter()
            .filter(|l| l.topic == topic)
            .cloned()
            .collect();

        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| (listener.callback)(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    let err = StateError::ListenerFailed {
                        id: listener.id,
                        reason: e.to_string(),
                    };
                    warn!(topic = %topic, error = %err, "State listener failed");
                }
                Err(_) => {
                    error!(listener = %listener.id, topic = %topic, "State listener panicked");
                }
            }
        }
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
