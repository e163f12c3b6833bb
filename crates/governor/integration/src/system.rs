//! The integrated safety system.
//!
//! Owns the safety framework, capacity governance and equivalence validator,
//! shares a host-supplied [`StateManager`], and decides when to stop.
//!
//! Locking: every stop decision and recovery runs under one async gate, so
//! two stop requests never interleave. Short sync state sits in a
//! `parking_lot` mutex that is never held across an `.await`.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use maple_governor_capacity::{CapacityGovernance, CapacityReport, PriorityScore, StartOutcome};
use maple_governor_equivalence::{null_snapshot, EquivalenceReport, EquivalenceValidator, SnapshotPublisher};
use maple_governor_safety::{FnInvariant, SafetyFramework, SafetyReport};
use maple_governor_state::{
    EmergencyStopNotice, ListenerId, MetricsUpdate, StateEvent, StateManager, StateTopic,
    WorkloadLevel,
};
use maple_governor_types::{
    ComponentHealth, IntegrationStatus, SafetyLevel, StopPolicy, StopTrigger, SystemState,
    WorkItem, WorkItemId,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::config::GovernorConfig;
use crate::error::{IntegrationError, IntegrationResult};
use crate::hook::{EmergencyStopHook, NoOpStopHook};
use crate::hysteresis::HysteresisTracker;
use crate::policy::{
    resolve_policy, sanitize_severity, EmergencyStopOutcome, EmergencyStopRecord, StopDecision,
};
use crate::report::{
    ComponentStatus, HealthReport, IntegrationCheckpoint, IntegrationReport, RecoveryReport,
    StopConditions,
};

pub const CAPACITY_INVARIANT: &str = "capacity-ok";
pub const EQUIVALENCE_INVARIANT: &str = "equivalence-threshold";
pub const STATE_SAFETY_INVARIANT: &str = "state-safety-score";

const SAFETY_WEIGHT: f64 = 0.4;
const CAPACITY_WEIGHT: f64 = 0.3;
const EQUIVALENCE_WEIGHT: f64 = 0.3;
const EXACT_EQUIVALENCE_BONUS_AT: f64 = 0.998;
const EXACT_EQUIVALENCE_BONUS: f64 = 0.05;
const THRESHOLD_EQUIVALENCE_BONUS: f64 = 0.02;
const SEVERITY_EPSILON: f64 = 1e-9;

struct StopState {
    active_policy: Option<StopPolicy>,
    hysteresis: HysteresisTracker,
    last_recovery: Option<Instant>,
    fallback_active: bool,
    emergency_stop_count: u32,
}

/// Orchestrator over the governor components.
pub struct IntegratedSafetySystem {
    config: GovernorConfig,
    safety: Arc<SafetyFramework>,
    capacity: Arc<CapacityGovernance>,
    equivalence: Arc<EquivalenceValidator>,
    state_manager: Arc<StateManager>,
    status: Arc<RwLock<IntegrationStatus>>,
    status_listener: ListenerId,
    stop_gate: tokio::sync::Mutex<()>,
    stop: Mutex<StopState>,
    history: RwLock<VecDeque<(Instant, EmergencyStopRecord)>>,
    hook: RwLock<Arc<dyn EmergencyStopHook>>,
    ready_tx: watch::Sender<bool>,
    last_checkpoint: RwLock<Option<IntegrationCheckpoint>>,
}

impl IntegratedSafetySystem {
    /// Build and wire the components. The system stays `Initializing` until
    /// [`initialize`](Self::initialize) runs.
    pub fn new(config: GovernorConfig, state_manager: Arc<StateManager>) -> IntegrationResult<Self> {
        config.validate()?;

        let safety = Arc::new(SafetyFramework::new(config.safety.clone()));
        let capacity = Arc::new(CapacityGovernance::new(config.capacity.clone()));
        let equivalence = Arc::new(EquivalenceValidator::new(config.equivalence.clone()));

        register_cross_cutting_invariants(&config, &safety, &capacity, &equivalence, &state_manager)?;

        let sm = state_manager.clone();
        let publisher: Arc<dyn SnapshotPublisher> =
            Arc::new(move |snapshot: &Map<String, Value>| -> anyhow::Result<()> {
                sm.publish_equivalence_metrics(snapshot);
                Ok(())
            });
        equivalence.set_publisher(publisher);
        equivalence.publish(&null_snapshot());

        let status = Arc::new(RwLock::new(IntegrationStatus::Initializing));
        let synced = status.clone();
        let status_listener = state_manager.add_listener(StateTopic::StateChange, move |event| {
            if let StateEvent::StateChanged(transition) = event {
                *synced.write() = IntegrationStatus::from_system_state(transition.to);
            }
            Ok(())
        });

        let (ready_tx, _) = watch::channel(false);
        let hysteresis = HysteresisTracker::new(config.hysteresis.clone());

        info!(
            wip_limit = config.capacity.normal_wip_limit,
            equivalence_threshold = config.equivalence.equivalence_threshold,
            window = config.hysteresis.window_size,
            "Integrated safety system wired"
        );

        Ok(Self {
            config,
            safety,
            capacity,
            equivalence,
            state_manager,
            status,
            status_listener,
            stop_gate: tokio::sync::Mutex::new(()),
            stop: Mutex::new(StopState {
                active_policy: None,
                hysteresis,
                last_recovery: None,
                fallback_active: false,
                emergency_stop_count: 0,
            }),
            history: RwLock::new(VecDeque::new()),
            hook: RwLock::new(Arc::new(NoOpStopHook)),
            ready_tx,
            last_checkpoint: RwLock::new(None),
        })
    }

    /// `new` followed by `initialize`.
    pub async fn start(
        config: GovernorConfig,
        state_manager: Arc<StateManager>,
    ) -> IntegrationResult<Arc<Self>> {
        let system = Arc::new(Self::new(config, state_manager)?);
        system.initialize().await;
        Ok(system)
    }

    /// Bounded boot: one safety check, then `Ready`. On timeout the system
    /// continues degraded as `Warning`. Readiness is signalled either way.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> IntegrationStatus {
        let bound = self.config.boot.ready_timeout();
        let drift = self.equivalence.overall_score();

        match timeout(bound, self.safety.run_safety_check_with_drift(Some(drift))).await {
            Ok(check) => {
                if !self.status().is_stopped() {
                    self.set_status(IntegrationStatus::Ready, "boot complete");
                }
                info!(level = %check.level, score = check.score, "Integrated safety system ready");
            }
            Err(_) => {
                warn!(timeout_secs = bound.as_secs(), "Boot timed out; continuing degraded");
                if !self.status().is_stopped() {
                    self.set_status(IntegrationStatus::Warning, "boot timed out");
                }
            }
        }

        self.ready_tx.send_replace(true);
        self.status()
    }

    /// Wait for boot to finish, up to the ready timeout. Returns false when
    /// the wait timed out and the caller proceeds degraded.
    pub async fn await_ready(&self) -> bool {
        let mut rx = self.ready_tx.subscribe();
        if *rx.borrow() {
            return true;
        }
        let ready = matches!(
            timeout(self.config.boot.ready_timeout(), rx.wait_for(|ready| *ready)).await,
            Ok(Ok(_))
        );
        if !ready {
            warn!("Readiness wait timed out; proceeding degraded");
        }
        ready
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    pub fn safety(&self) -> &Arc<SafetyFramework> {
        &self.safety
    }

    pub fn capacity(&self) -> &Arc<CapacityGovernance> {
        &self.capacity
    }

    pub fn equivalence(&self) -> &Arc<EquivalenceValidator> {
        &self.equivalence
    }

    pub fn state_manager(&self) -> &Arc<StateManager> {
        &self.state_manager
    }

    pub fn status(&self) -> IntegrationStatus {
        *self.status.read()
    }

    pub fn active_policy(&self) -> Option<StopPolicy> {
        self.stop.lock().active_policy
    }

    pub fn fallback_active(&self) -> bool {
        self.stop.lock().fallback_active
    }

    /// Hard stops executed since construction.
    pub fn emergency_stop_count(&self) -> u32 {
        self.stop.lock().emergency_stop_count
    }

    pub fn last_checkpoint(&self) -> Option<IntegrationCheckpoint> {
        self.last_checkpoint.read().clone()
    }

    pub fn set_stop_hook(&self, hook: Arc<dyn EmergencyStopHook>) {
        *self.hook.write() = hook;
    }

    // ------------------------------------------------------------------
    // Work lifecycle
    // ------------------------------------------------------------------

    pub async fn add_work_item(&self, item: WorkItem) -> IntegrationResult<PriorityScore> {
        self.await_ready().await;
        Ok(self.capacity.add_work_item(item)?)
    }

    /// Start a work item. Refused outright while an emergency stop is active.
    pub async fn start_work_item(&self, id: &WorkItemId) -> IntegrationResult<StartOutcome> {
        self.await_ready().await;
        if self.status().is_stopped() {
            warn!(item = %id, "Start refused during emergency stop");
            return Err(IntegrationError::EmergencyStopActive);
        }

        let outcome = self.capacity.start_work_item(id)?;
        if outcome.is_started() {
            self.publish_wip();
            self.refresh_activity_status();
        }
        Ok(outcome)
    }

    pub async fn complete_work_item(
        &self,
        id: &WorkItemId,
        actual_workload: u8,
        loc: u64,
        files: u64,
    ) -> IntegrationResult<WorkItem> {
        self.await_ready().await;
        let item = self
            .capacity
            .complete_work_item(id, actual_workload, loc, files)?;
        self.publish_wip();
        self.refresh_activity_status();
        Ok(item)
    }

    pub async fn block_work_item(&self, id: &WorkItemId, reason: &str) -> IntegrationResult<()> {
        self.await_ready().await;
        self.capacity.block_work_item(id, reason)?;
        self.publish_wip();
        self.refresh_activity_status();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Heartbeat
    // ------------------------------------------------------------------

    /// Run every component check, raise stop requests and publish the
    /// composite score.
    #[instrument(skip(self))]
    pub async fn run_integration_check(&self) -> IntegrationCheckpoint {
        self.await_ready().await;

        let equivalence = self.equivalence.metrics();
        let eq_score = equivalence.overall_score;
        let safety = self.safety.run_safety_check_with_drift(Some(eq_score)).await;
        let capacity = self.capacity.check_capacity_limits();
        self.equivalence.publish_equivalence_snapshot();

        let eq_ok = eq_score >= self.config.equivalence.equivalence_threshold;
        let cap_ok = capacity.all_ok();
        let safety_critical = safety.is_critical();

        let mut stops = Vec::new();
        if !eq_ok {
            let details = json!({
                "source": "equivalence",
                "overall_score": eq_score,
                "threshold": self.config.equivalence.equivalence_threshold,
            });
            stops.push(
                self.emergency_stop(StopTrigger::EquivalenceViolation, 1.0 - eq_score, details)
                    .await,
            );
        }
        if safety_critical && safety.framework_enabled {
            let details = json!({
                "source": "safety",
                "level": safety.level,
                "failed": safety.failed_ids(),
            });
            stops.push(
                self.emergency_stop(StopTrigger::PerformanceThreshold, 1.0, details)
                    .await,
            );
        }
        if !cap_ok {
            let details = json!({
                "source": "capacity",
                "violations": capacity.violations(),
            });
            stops.push(
                self.emergency_stop_with(
                    StopTrigger::PerformanceThreshold,
                    self.config.stop_policy.capacity_violation_severity,
                    details,
                    Some(StopPolicy::Gradual),
                )
                .await,
            );
        }

        if safety_critical && safety.framework_enabled && !self.status().is_stopped() {
            self.fail_safe_stop(
                StopTrigger::PerformanceThreshold,
                "safety critical without an executed stop",
                json!({ "failed": safety.failed_ids() }),
            )
            .await;
        }

        let stop_fired = stops.iter().any(EmergencyStopOutcome::executed);
        let status = if self.status().is_stopped() {
            IntegrationStatus::EmergencyStop
        } else if !eq_ok || !cap_ok || self.fallback_active() {
            IntegrationStatus::Warning
        } else if self.capacity.current_wip() > 0 {
            IntegrationStatus::Running
        } else {
            IntegrationStatus::Ready
        };
        if !status.is_stopped() {
            self.set_status(status, "integration check");
        }

        let composite = composite_score(
            !safety_critical,
            cap_ok,
            eq_ok,
            eq_score,
            self.config.equivalence.equivalence_threshold,
            stop_fired,
        );
        let metrics = self.capacity.metrics();
        self.state_manager.update_metrics(
            MetricsUpdate::new()
                .safety_score(composite)
                .equivalence_score(eq_score)
                .current_wip(i64::from(metrics.current_wip))
                .wip_limit(i64::from(metrics.wip_limit))
                .capacity_utilization(metrics.utilization)
                .workload_level(WorkloadLevel::from_utilization(metrics.utilization).to_string()),
        );

        debug!(
            status = %status,
            composite = composite,
            safety = %safety.level,
            equivalence = eq_score,
            capacity_ok = cap_ok,
            "Integration check complete"
        );

        let checkpoint = IntegrationCheckpoint {
            timestamp: Utc::now(),
            status: self.status(),
            safety,
            capacity,
            equivalence,
            stops,
            composite_score: composite,
        };
        *self.last_checkpoint.write() = Some(checkpoint.clone());
        checkpoint
    }

    // ------------------------------------------------------------------
    // Emergency stop
    // ------------------------------------------------------------------

    /// Request an emergency stop. The policy is resolved from trigger and
    /// severity; the request may be suppressed as a repeat, by an active
    /// policy of equal or higher priority, or by the hysteresis window.
    pub async fn emergency_stop(
        &self,
        trigger: StopTrigger,
        severity: f64,
        details: Value,
    ) -> EmergencyStopOutcome {
        self.emergency_stop_with(trigger, severity, details, None).await
    }

    #[instrument(skip(self, details), fields(trigger = %trigger))]
    async fn emergency_stop_with(
        &self,
        trigger: StopTrigger,
        severity: f64,
        details: Value,
        policy_override: Option<StopPolicy>,
    ) -> EmergencyStopOutcome {
        let _flight = self.stop_gate.lock().await;

        let severity = sanitize_severity(severity);
        let policy = policy_override
            .unwrap_or_else(|| resolve_policy(trigger, severity, &self.config.stop_policy));
        let now = Instant::now();

        if let Some(decision) = self.evaluate_stop(trigger, severity, policy, now) {
            info!(
                trigger = %trigger,
                policy = %policy,
                severity = severity,
                decision = ?decision,
                "Emergency stop request suppressed"
            );
            let record = EmergencyStopRecord::new(trigger, severity, policy, decision, details);
            self.push_history(now, record.clone());
            return EmergencyStopOutcome {
                record,
                active_policy: self.active_policy(),
            };
        }

        let mut record =
            EmergencyStopRecord::new(trigger, severity, policy, StopDecision::Executed, details);
        if policy.is_hard_stop() {
            self.apply_hard_stop(&record, now);
        } else {
            self.apply_gradual(&record);
        }

        let hook = self.hook.read().clone();
        let failure = match AssertUnwindSafe(hook.on_stop(&record)).catch_unwind().await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("stop hook failed: {}", e)),
            Err(_) => Some("stop hook panicked".to_string()),
        };
        if let Some(reason) = failure {
            self.force_hard_stop(&record, &reason, now);
            record.decision = StopDecision::FailSafe { error: reason };
        }

        self.push_history(now, record.clone());
        EmergencyStopOutcome {
            record,
            active_policy: self.active_policy(),
        }
    }

    /// Returns the suppressing decision, or `None` when the stop should run.
    ///
    /// Order: repeat suppression, then the hysteresis record and warmup,
    /// then the active policy, then the hysteresis window.
    fn evaluate_stop(
        &self,
        trigger: StopTrigger,
        severity: f64,
        policy: StopPolicy,
        now: Instant,
    ) -> Option<StopDecision> {
        if self.is_duplicate(trigger, severity, now) {
            return Some(StopDecision::Duplicate);
        }

        let stopped = self.status().is_stopped();
        let mut stop = self.stop.lock();

        let violations = if policy == StopPolicy::Hysteresis {
            let violations = stop.hysteresis.record_violation(trigger, now);
            if let Some(remaining) = stop.hysteresis.warmup_remaining(trigger, now) {
                return Some(StopDecision::WarmupActive { remaining });
            }
            Some(violations)
        } else {
            None
        };

        // A stop with no recorded policy came from outside; treat it as the hardest.
        let active = stop
            .active_policy
            .or_else(|| stopped.then_some(StopPolicy::Immediate));
        if let Some(active) = active {
            if policy.priority() <= active.priority() {
                return Some(StopDecision::ActivePolicyHolds { active });
            }
        }

        let required = stop.hysteresis.window_size();
        match violations {
            Some(violations) if violations < required => Some(StopDecision::PendingHysteresis {
                violations,
                required,
            }),
            _ => None,
        }
    }

    /// An executed stop for the same trigger, since the last recovery,
    /// inside the dedupe window, with a close severity. The resolved policy
    /// plays no part: close severities on either side of a policy boundary
    /// are still one incident.
    fn is_duplicate(&self, trigger: StopTrigger, severity: f64, now: Instant) -> bool {
        let last_recovery = self.stop.lock().last_recovery;
        let window = self.config.stop_policy.dedupe_window();
        let tolerance = self.config.stop_policy.severity_tolerance + SEVERITY_EPSILON;

        self.history.read().iter().rev().any(|(at, record)| {
            record.executed()
                && record.trigger == trigger
                && last_recovery.map_or(true, |r| *at >= r)
                && now.saturating_duration_since(*at) <= window
                && (record.severity - severity).abs() <= tolerance
        })
    }

    fn apply_hard_stop(&self, record: &EmergencyStopRecord, now: Instant) {
        self.safety.emergency_stop();
        {
            let mut stop = self.stop.lock();
            stop.active_policy = Some(record.policy);
            stop.emergency_stop_count = stop.emergency_stop_count.saturating_add(1);
            if record.trigger != StopTrigger::ObservabilityMissing {
                stop.hysteresis.mark_stopped(record.trigger, now);
            }
        }
        *self.status.write() = IntegrationStatus::EmergencyStop;

        error!(
            trigger = %record.trigger,
            policy = %record.policy,
            severity = record.severity,
            "Emergency stop executed"
        );
        self.notify_stop(record, format!("emergency stop: {}", record.trigger));
    }

    fn apply_gradual(&self, record: &EmergencyStopRecord) {
        {
            let mut stop = self.stop.lock();
            stop.active_policy = Some(StopPolicy::Gradual);
            stop.fallback_active = true;
        }
        let limit = self.capacity.enter_conservative_mode();
        self.safety.set_conservative(true);
        self.set_status(
            IntegrationStatus::Warning,
            &format!("conservative fallback: {}", record.trigger),
        );
        warn!(
            trigger = %record.trigger,
            severity = record.severity,
            admission_limit = limit,
            "Gradual stop: conservative fallback active"
        );
    }

    /// Fail-safe path: whatever was being executed, end in a hard stop.
    fn force_hard_stop(&self, record: &EmergencyStopRecord, reason: &str, now: Instant) {
        error!(
            critical = true,
            trigger = %record.trigger,
            policy = %record.policy,
            reason = %reason,
            "Stop execution failed; forcing emergency stop"
        );

        self.safety.emergency_stop();
        let newly_stopped = {
            let mut stop = self.stop.lock();
            stop.active_policy = Some(StopPolicy::Immediate);
            let newly = !record.policy.is_hard_stop();
            if newly {
                stop.emergency_stop_count = stop.emergency_stop_count.saturating_add(1);
                if record.trigger != StopTrigger::ObservabilityMissing {
                    stop.hysteresis.mark_stopped(record.trigger, now);
                }
            }
            newly
        };
        *self.status.write() = IntegrationStatus::EmergencyStop;

        if newly_stopped {
            self.notify_stop(record, format!("fail-safe stop: {}", reason));
        }
    }

    /// Hard stop outside the request path, used when a critical condition
    /// was not answered by an executed stop.
    async fn fail_safe_stop(&self, trigger: StopTrigger, reason: &str, details: Value) {
        let _flight = self.stop_gate.lock().await;
        if self.status().is_stopped() {
            return;
        }
        let now = Instant::now();
        let record = EmergencyStopRecord::new(
            trigger,
            1.0,
            StopPolicy::Gradual,
            StopDecision::FailSafe {
                error: reason.to_string(),
            },
            details,
        );
        self.force_hard_stop(&record, reason, now);
        self.push_history(now, record);
    }

    fn notify_stop(&self, record: &EmergencyStopRecord, reason: String) {
        let notice = EmergencyStopNotice::new(reason)
            .with_trigger(record.trigger)
            .with_policy(record.policy)
            .with_severity(record.severity)
            .with_details(json!({
                "record": record.id.to_string(),
                "details": record.details,
            }));
        self.state_manager.trigger_emergency_stop(notice);
    }

    fn push_history(&self, at: Instant, record: EmergencyStopRecord) {
        let mut history = self.history.write();
        history.push_back((at, record));
        while history.len() > self.config.stop_policy.history_limit {
            history.pop_front();
        }
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Leave `EmergencyStop` for `Ready` once every trigger's warmup has
    /// elapsed, then run one confirmation check.
    #[instrument(skip(self))]
    pub async fn recover_from_emergency_stop(&self, reason: &str) -> RecoveryReport {
        {
            let _flight = self.stop_gate.lock().await;

            let status = self.status();
            if !status.is_stopped() {
                return RecoveryReport {
                    recovered: false,
                    status,
                    message: "not in emergency stop".into(),
                    blocking_triggers: Vec::new(),
                    checkpoint: None,
                };
            }

            let now = Instant::now();
            let blocking: Vec<StopTrigger> = {
                let stop = self.stop.lock();
                StopTrigger::ALL
                    .into_iter()
                    .filter(|t| stop.hysteresis.warmup_remaining(*t, now).is_some())
                    .collect()
            };
            if !blocking.is_empty() {
                warn!(blocking = ?blocking, "Recovery blocked by active warmup");
                return RecoveryReport {
                    recovered: false,
                    status,
                    message: "warmup still active".into(),
                    blocking_triggers: blocking,
                    checkpoint: None,
                };
            }

            self.safety.enable();
            self.safety.set_conservative(false);
            self.capacity.exit_conservative_mode();
            {
                let mut stop = self.stop.lock();
                stop.active_policy = None;
                stop.fallback_active = false;
                stop.last_recovery = Some(now);
            }
            *self.status.write() = IntegrationStatus::Ready;
            self.resync_state_manager(reason).await;

            self.equivalence.reset_results();
            self.equivalence.publish_equivalence_snapshot();
            self.state_manager.update_metrics(
                MetricsUpdate::new()
                    .equivalence_score(1.0)
                    .safety_score(1.0),
            );
            info!(reason = reason, "Recovered from emergency stop");
        }

        let checkpoint = self.run_integration_check().await;
        let status = self.status();
        RecoveryReport {
            recovered: !status.is_stopped(),
            status,
            message: format!("recovered: {}", reason),
            blocking_triggers: Vec::new(),
            checkpoint: Some(checkpoint),
        }
    }

    async fn resync_state_manager(&self, reason: &str) -> bool {
        let attempts = self.config.boot.recovery_retries.max(1);
        for attempt in 1..=attempts {
            self.state_manager.change_state(
                SystemState::Ready,
                reason,
                json!({ "recovery": true, "attempt": attempt }),
            );
            if self.state_manager.current_state() == SystemState::Ready {
                return true;
            }
            warn!(attempt = attempt, "State manager did not confirm recovery; retrying");
            sleep(self.config.boot.recovery_retry_pause()).await;
        }
        error!(attempts = attempts, "State manager resync failed after recovery");
        false
    }

    /// Leave the gradual fallback without waiting for a recovery.
    pub fn exit_fallback_mode(&self) -> bool {
        if self.status().is_stopped() {
            return false;
        }
        {
            let mut stop = self.stop.lock();
            if !stop.fallback_active {
                return false;
            }
            stop.fallback_active = false;
            if stop.active_policy == Some(StopPolicy::Gradual) {
                stop.active_policy = None;
            }
        }
        self.capacity.exit_conservative_mode();
        self.safety.set_conservative(false);

        let status = if self.capacity.current_wip() > 0 {
            IntegrationStatus::Running
        } else {
            IntegrationStatus::Ready
        };
        self.set_status(status, "conservative fallback exited");
        info!("Conservative fallback exited");
        true
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn check_emergency_stop_conditions(&self) -> StopConditions {
        let now = Instant::now();
        let (active_policy, windows) = {
            let stop = self.stop.lock();
            (stop.active_policy, stop.hysteresis.status(now))
        };
        let status = self.status();

        let mut reasons = Vec::new();
        if status.is_stopped() {
            reasons.push(match active_policy {
                Some(policy) => format!("emergency stop active ({})", policy),
                None => "emergency stop active".to_string(),
            });
        }
        for window in windows.iter().filter(|w| w.satisfied) {
            reasons.push(format!(
                "{} hysteresis window full ({}/{})",
                window.trigger, window.violations_in_span, window.window_size
            ));
        }
        let eq_score = self.equivalence.overall_score();
        if eq_score < self.config.equivalence.equivalence_threshold {
            reasons.push(format!("equivalence score {:.4} below threshold", eq_score));
        }
        let limits = self.capacity.check_capacity_limits();
        if !limits.all_ok() {
            reasons.push(format!("capacity limits violated: {}", limits.violations().join(", ")));
        }

        StopConditions {
            should_trigger: !reasons.is_empty(),
            reasons,
            status,
            active_policy,
            windows,
        }
    }

    /// Stop records, oldest first. `limit` keeps only the newest entries.
    pub fn get_emergency_stop_history(&self, limit: Option<usize>) -> Vec<EmergencyStopRecord> {
        let history = self.history.read();
        let skip = limit.map_or(0, |n| history.len().saturating_sub(n));
        history.iter().skip(skip).map(|(_, r)| r.clone()).collect()
    }

    pub fn get_capacity_report(&self) -> CapacityReport {
        self.capacity.report()
    }

    pub fn get_equivalence_report(&self) -> EquivalenceReport {
        self.equivalence.report()
    }

    pub fn get_safety_report(&self) -> SafetyReport {
        self.safety.report()
    }

    pub fn health_check(&self) -> HealthReport {
        let status = self.status();
        let safety = self.safety.report();
        let (safety_health, safety_detail) = if !safety.enabled {
            (ComponentHealth::Critical, "framework disabled".to_string())
        } else {
            match safety.last_check.as_ref().map(|c| c.level) {
                None => (ComponentHealth::Healthy, "no checks yet".to_string()),
                Some(SafetyLevel::Safe) => (ComponentHealth::Healthy, "safe".to_string()),
                Some(SafetyLevel::Critical) => (ComponentHealth::Critical, "critical".to_string()),
                Some(level) => (ComponentHealth::Degraded, level.to_string()),
            }
        };

        let limits = self.capacity.check_capacity_limits();
        let capacity_health = if !limits.all_ok() || self.capacity.is_conservative() {
            ComponentHealth::Degraded
        } else {
            ComponentHealth::Healthy
        };
        let capacity_detail = if limits.all_ok() {
            format!(
                "wip {}/{} (admitting up to {})",
                self.capacity.current_wip(),
                self.capacity.wip_limit(),
                self.capacity.admission_limit()
            )
        } else {
            format!("violations: {}", limits.violations().join(", "))
        };

        let eq_config = &self.config.equivalence;
        let eq_score = self.equivalence.overall_score();
        let equivalence_health = if eq_score >= eq_config.equivalence_threshold {
            ComponentHealth::Healthy
        } else if eq_score >= eq_config.low_threshold {
            ComponentHealth::Degraded
        } else {
            ComponentHealth::Critical
        };

        let integration_health = match status {
            IntegrationStatus::Ready | IntegrationStatus::Running => ComponentHealth::Healthy,
            IntegrationStatus::Initializing | IntegrationStatus::Warning => ComponentHealth::Degraded,
            IntegrationStatus::Error | IntegrationStatus::EmergencyStop => ComponentHealth::Critical,
        };

        let components = vec![
            ComponentStatus {
                component: "safety".into(),
                health: safety_health,
                detail: safety_detail,
            },
            ComponentStatus {
                component: "capacity".into(),
                health: capacity_health,
                detail: capacity_detail,
            },
            ComponentStatus {
                component: "equivalence".into(),
                health: equivalence_health,
                detail: format!("overall score {:.4}", eq_score),
            },
            ComponentStatus {
                component: "integration".into(),
                health: integration_health,
                detail: status.to_string(),
            },
        ];

        HealthReport {
            overall: ComponentHealth::worst(components.iter().map(|c| c.health)),
            status,
            components,
            windows: self.stop.lock().hysteresis.status(Instant::now()),
            timestamp: Utc::now(),
        }
    }

    pub fn get_integration_report(&self) -> IntegrationReport {
        let (active_policy, fallback_active, emergency_stop_count) = {
            let stop = self.stop.lock();
            (stop.active_policy, stop.fallback_active, stop.emergency_stop_count)
        };

        IntegrationReport {
            status: self.status(),
            active_policy,
            fallback_active,
            emergency_stop_count,
            health: self.health_check(),
            safety: self.safety.report(),
            capacity: self.capacity.report(),
            equivalence: self.equivalence.report(),
            state_metrics: self.state_manager.metrics(),
            recent_stops: self.get_emergency_stop_history(Some(10)),
            last_checkpoint: self.last_checkpoint(),
            timestamp: Utc::now(),
        }
    }

    // ------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------

    fn set_status(&self, new: IntegrationStatus, reason: &str) {
        let previous = std::mem::replace(&mut *self.status.write(), new);
        if previous != new {
            info!(from = %previous, to = %new, reason = reason, "Integration status changed");
        }
        if self.state_manager.current_state() != new.as_system_state() {
            self.state_manager
                .change_state(new.as_system_state(), reason, Value::Null);
        }
    }

    /// Ready and Running follow WIP. Other statuses are left alone.
    fn refresh_activity_status(&self) {
        let wip = self.capacity.current_wip();
        match self.status() {
            IntegrationStatus::Ready if wip > 0 => {
                self.set_status(IntegrationStatus::Running, "work in progress")
            }
            IntegrationStatus::Running if wip == 0 => {
                self.set_status(IntegrationStatus::Ready, "no work in progress")
            }
            _ => {}
        }
    }

    fn publish_wip(&self) {
        let metrics = self.capacity.metrics();
        self.state_manager.update_metrics(
            MetricsUpdate::new()
                .current_wip(i64::from(metrics.current_wip))
                .wip_limit(i64::from(metrics.wip_limit))
                .capacity_utilization(metrics.utilization)
                .workload_level(WorkloadLevel::from_utilization(metrics.utilization).to_string()),
        );
    }
}

impl Drop for IntegratedSafetySystem {
    fn drop(&mut self) {
        if let Err(e) = self.state_manager.remove_listener(self.status_listener) {
            debug!(error = %e, "Status listener already removed");
        }
    }
}

fn register_cross_cutting_invariants(
    config: &GovernorConfig,
    safety: &SafetyFramework,
    capacity: &Arc<CapacityGovernance>,
    equivalence: &Arc<EquivalenceValidator>,
    state_manager: &Arc<StateManager>,
) -> IntegrationResult<()> {
    let cap = capacity.clone();
    safety.register_invariant(Arc::new(FnInvariant::new(
        CAPACITY_INVARIANT,
        "capacity",
        move || Ok(cap.check_capacity_limits().all_ok()),
    )))?;

    let eq = equivalence.clone();
    let eq_threshold = config.equivalence.equivalence_threshold;
    safety.register_invariant(Arc::new(FnInvariant::new(
        EQUIVALENCE_INVARIANT,
        "equivalence",
        move || Ok(eq.overall_score() >= eq_threshold),
    )))?;

    let sm = state_manager.clone();
    let safety_threshold = config.safety.safety_threshold;
    safety.register_invariant(Arc::new(FnInvariant::new(
        STATE_SAFETY_INVARIANT,
        "state",
        move || Ok(sm.metrics().safety_score >= safety_threshold),
    )))?;

    Ok(())
}

/// Weighted health of one heartbeat, clamped to [0, 1].
fn composite_score(
    safety_ok: bool,
    capacity_ok: bool,
    equivalence_ok: bool,
    equivalence_score: f64,
    equivalence_threshold: f64,
    stop_fired: bool,
) -> f64 {
    let weight = |ok: bool, w: f64| if ok { w } else { 0.0 };
    let mut score = weight(safety_ok, SAFETY_WEIGHT)
        + weight(capacity_ok, CAPACITY_WEIGHT)
        + weight(equivalence_ok, EQUIVALENCE_WEIGHT);

    if equivalence_score >= EXACT_EQUIVALENCE_BONUS_AT {
        score += EXACT_EQUIVALENCE_BONUS;
    } else if equivalence_score >= equivalence_threshold {
        score += THRESHOLD_EQUIVALENCE_BONUS;
    }
    if stop_fired {
        score *= 0.5;
    }
    score.clamp(0.0, 1.0)
}
