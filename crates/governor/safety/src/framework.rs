//! The safety framework: invariant registry and aggregate safety checks.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::FutureExt;
use maple_governor_types::SafetyLevel;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::SafetyConfig;
use crate::error::{SafetyError, SafetyResult};
use crate::invariant::SafetyInvariant;
use crate::score::ScoreFinalizer;

/// Outcome of one invariant within a check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantOutcome {
    pub id: String,
    pub category: String,
    pub critical: bool,
    pub passed: bool,
    /// Why the invariant failed, when it did.
    pub failure: Option<String>,
}

/// Record of one safety check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: SafetyLevel,
    pub passed: usize,
    pub failed: usize,
    pub outcomes: Vec<InvariantOutcome>,
    /// Finalized score in the configured band.
    pub score: f64,
    /// Set when the caller should get ready to roll back.
    pub rollback_prepared: bool,
    pub critical_mode: bool,
    /// False when the framework was disabled by an emergency stop.
    pub framework_enabled: bool,
}

impl SafetyCheck {
    pub fn is_critical(&self) -> bool {
        self.level.is_critical()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.passed)
            .map(|o| o.id.as_str())
            .collect()
    }
}

/// Per-invariant bookkeeping shown in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantStatus {
    pub id: String,
    pub category: String,
    pub critical: bool,
    pub violations: u64,
    pub last_failure: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
}

/// Read-only view of the framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyReport {
    pub enabled: bool,
    pub conservative: bool,
    pub critical_mode: bool,
    pub total_checks: usize,
    pub invariants: Vec<InvariantStatus>,
    pub last_check: Option<SafetyCheck>,
}

struct Registered {
    invariant: Arc<dyn SafetyInvariant>,
    violations: u64,
    last_failure: Option<String>,
    last_checked: Option<DateTime<Utc>>,
}

/// Registry of safety invariants with aggregate scoring.
pub struct SafetyFramework {
    config: SafetyConfig,
    invariants: DashMap<String, Registered>,
    enabled: AtomicBool,
    conservative: AtomicBool,
    finalizer: Mutex<ScoreFinalizer>,
    history: RwLock<VecDeque<SafetyCheck>>,
}

impl SafetyFramework {
    pub fn new(config: SafetyConfig) -> Self {
        let finalizer = ScoreFinalizer::new(
            config.score_floor,
            config.score_ceiling,
            config.critical_enter_threshold,
            config.critical_exit_threshold,
        );

        Self {
            config,
            invariants: DashMap::new(),
            enabled: AtomicBool::new(true),
            conservative: AtomicBool::new(false),
            finalizer: Mutex::new(finalizer),
            history: RwLock::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    /// Register an invariant. Ids are unique.
    pub fn register_invariant(&self, invariant: Arc<dyn SafetyInvariant>) -> SafetyResult<()> {
        let id = invariant.id().to_string();
        if self.invariants.contains_key(&id) {
            return Err(SafetyError::DuplicateInvariant(id));
        }

        info!(
            invariant = %id,
            category = invariant.category(),
            critical = invariant.is_critical(),
            "Safety invariant registered"
        );
        self.invariants.insert(
            id,
            Registered {
                invariant,
                violations: 0,
                last_failure: None,
                last_checked: None,
            },
        );
        Ok(())
    }

    pub fn unregister(&self, id: &str) -> SafetyResult<()> {
        self.invariants
            .remove(id)
            .map(|_| debug!(invariant = %id, "Safety invariant unregistered"))
            .ok_or_else(|| SafetyError::InvariantNotFound(id.to_string()))
    }

    pub fn invariant_count(&self) -> usize {
        self.invariants.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_conservative(&self) -> bool {
        self.conservative.load(Ordering::SeqCst)
    }

    /// In conservative mode rollback is prepared on HIGH as well as CRITICAL.
    pub fn set_conservative(&self, conservative: bool) {
        let was = self.conservative.swap(conservative, Ordering::SeqCst);
        if was != conservative {
            info!(conservative = conservative, "Safety conservative mode changed");
        }
    }

    pub fn critical_mode(&self) -> bool {
        self.finalizer.lock().critical_mode()
    }

    /// Kill switch. Every check reports CRITICAL until [`enable`](Self::enable).
    pub fn emergency_stop(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            error!("Safety framework disabled by emergency stop");
        }
    }

    pub fn enable(&self) {
        if !self.enabled.swap(true, Ordering::SeqCst) {
            self.finalizer.lock().reset();
            info!("Safety framework re-enabled");
        }
    }

    /// Run every invariant and classify the result.
    pub async fn run_safety_check(&self) -> SafetyCheck {
        self.run_safety_check_with_drift(None).await
    }

    /// Run every invariant, feeding `drift_avg` into critical-mode hysteresis.
    #[instrument(skip(self))]
    pub async fn run_safety_check_with_drift(&self, drift_avg: Option<f64>) -> SafetyCheck {
        if !self.is_enabled() {
            let check = SafetyCheck {
                id: Uuid::new_v4(),
                timestamp: Utc::now(),
                level: SafetyLevel::Critical,
                passed: 0,
                failed: 0,
                outcomes: Vec::new(),
                score: self.config.score_floor,
                rollback_prepared: true,
                critical_mode: self.critical_mode(),
                framework_enabled: false,
            };
            warn!("Safety check requested while framework disabled");
            self.record(check.clone());
            return check;
        }

        let mut snapshot: Vec<Arc<dyn SafetyInvariant>> = self
            .invariants
            .iter()
            .map(|entry| entry.value().invariant.clone())
            .collect();
        snapshot.sort_by(|a, b| a.id().cmp(b.id()));

        let mut outcomes = Vec::with_capacity(snapshot.len());
        for invariant in snapshot {
            let failure = match AssertUnwindSafe(invariant.check()).catch_unwind().await {
                Ok(Ok(true)) => None,
                Ok(Ok(false)) => Some("invariant returned false".to_string()),
                Ok(Err(e)) => Some(format!("invariant check failed: {}", e)),
                Err(_) => Some("invariant check panicked".to_string()),
            };

            let now = Utc::now();
            if let Some(mut entry) = self.invariants.get_mut(invariant.id()) {
                entry.last_checked = Some(now);
                if let Some(reason) = &failure {
                    entry.violations += 1;
                    entry.last_failure = Some(reason.clone());
                }
            }

            if let Some(reason) = &failure {
                error!(
                    invariant = invariant.id(),
                    critical = invariant.is_critical(),
                    reason = %reason,
                    "Safety invariant violated"
                );
            }

            outcomes.push(InvariantOutcome {
                id: invariant.id().to_string(),
                category: invariant.category().to_string(),
                critical: invariant.is_critical(),
                passed: failure.is_none(),
                failure,
            });
        }

        let failed = outcomes.iter().filter(|o| !o.passed).count();
        let passed = outcomes.len() - failed;
        let level = classify(&outcomes);

        let raw = if outcomes.is_empty() {
            1.0
        } else {
            passed as f64 / outcomes.len() as f64
        };
        let final_score = self.finalizer.lock().finalize(raw, drift_avg);

        let rollback_prepared = level.is_critical()
            || final_score.critical_mode
            || (self.is_conservative() && level == SafetyLevel::High);

        let check = SafetyCheck {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            passed,
            failed,
            outcomes,
            score: final_score.score,
            rollback_prepared,
            critical_mode: final_score.critical_mode,
            framework_enabled: true,
        };

        if rollback_prepared {
            warn!(level = %level, "Rollback preparation flagged");
        }
        debug!(
            level = %level,
            passed = passed,
            failed = failed,
            score = check.score,
            "Safety check complete"
        );

        self.record(check.clone());
        check
    }

    /// Check records, newest last.
    pub fn history(&self) -> Vec<SafetyCheck> {
        self.history.read().iter().cloned().collect()
    }

    pub fn last_check(&self) -> Option<SafetyCheck> {
        self.history.read().back().cloned()
    }

    pub fn report(&self) -> SafetyReport {
        let mut invariants: Vec<InvariantStatus> = self
            .invariants
            .iter()
            .map(|entry| InvariantStatus {
                id: entry.key().clone(),
                category: entry.invariant.category().to_string(),
                critical: entry.invariant.is_critical(),
                violations: entry.violations,
                last_failure: entry.last_failure.clone(),
                last_checked: entry.last_checked,
            })
            .collect();
        invariants.sort_by(|a, b| a.id.cmp(&b.id));

        let history = self.history.read();
        SafetyReport {
            enabled: self.is_enabled(),
            conservative: self.is_conservative(),
            critical_mode: self.critical_mode(),
            total_checks: history.len(),
            invariants,
            last_check: history.back().cloned(),
        }
    }

    fn record(&self, check: SafetyCheck) {
        let mut history = self.history.write();
        history.push_back(check);
        while history.len() > self.config.history_limit {
            history.pop_front();
        }
    }
}

impl Default for SafetyFramework {
    fn default() -> Self {
        Self::new(SafetyConfig::default())
    }
}

/// CRITICAL if any critical invariant failed, HIGH if any failed, else SAFE.
fn classify(outcomes: &[InvariantOutcome]) -> SafetyLevel {
    if outcomes.iter().any(|o| o.critical && !o.passed) {
        SafetyLevel::Critical
    } else if outcomes.iter().any(|o| !o.passed) {
        SafetyLevel::High
    } else {
        SafetyLevel::Safe
    }
}
