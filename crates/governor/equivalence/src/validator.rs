//! The equivalence validator.
//!
//! Candidates are plain functions `(input) -> output`. A candidate that
//! returns an error or panics scores zero; it never takes the validator down.

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use maple_governor_types::EquivalenceLevel;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::case::{
    EquivalenceMetrics, EquivalenceReport, FullValidationSummary, TestCase, ValidationResult,
};
use crate::config::EquivalenceConfig;
use crate::error::{EquivalenceError, EquivalenceResult};
use crate::golden::{verify_golden_set, GoldenSetVerification};
use crate::scoring::{bucket, score_exact, score_performance, score_structural, ValidationType};

/// A candidate implementation under test.
pub type Candidate = dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync;

/// Receives equivalence snapshots (telemetry, persistence, the state manager).
pub trait SnapshotPublisher: Send + Sync {
    fn publish(&self, snapshot: &Map<String, Value>) -> anyhow::Result<()>;
}

impl<F> SnapshotPublisher for F
where
    F: Fn(&Map<String, Value>) -> anyhow::Result<()> + Send + Sync,
{
    fn publish(&self, snapshot: &Map<String, Value>) -> anyhow::Result<()> {
        self(snapshot)
    }
}

/// Snapshot keys published by the validator.
pub const SNAPSHOT_KEYS: [&str; 7] = [
    "overall_score",
    "critical_score",
    "normal_score",
    "total_tests",
    "passed_tests",
    "failed_tests",
    "last_validation",
];

/// A snapshot with every validator key present and null.
pub fn null_snapshot() -> Map<String, Value> {
    SNAPSHOT_KEYS
        .iter()
        .map(|k| (k.to_string(), Value::Null))
        .collect()
}

/// Baseline-vs-candidate validator.
pub struct EquivalenceValidator {
    config: EquivalenceConfig,
    cases: RwLock<BTreeMap<String, TestCase>>,
    latest: RwLock<HashMap<String, ValidationResult>>,
    publisher: RwLock<Option<Arc<dyn SnapshotPublisher>>>,
}

impl EquivalenceValidator {
    pub fn new(config: EquivalenceConfig) -> Self {
        Self {
            config,
            cases: RwLock::new(BTreeMap::new()),
            latest: RwLock::new(HashMap::new()),
            publisher: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &EquivalenceConfig {
        &self.config
    }

    pub fn register_test_case(&self, case: TestCase) -> EquivalenceResult<()> {
        let mut cases = self.cases.write();
        if cases.contains_key(&case.id) {
            return Err(EquivalenceError::DuplicateTestCase(case.id));
        }
        debug!(case = %case.id, critical = case.critical, "Test case registered");
        cases.insert(case.id.clone(), case);
        Ok(())
    }

    pub fn remove_test_case(&self, case_id: &str) -> EquivalenceResult<TestCase> {
        let removed = self
            .cases
            .write()
            .remove(case_id)
            .ok_or_else(|| EquivalenceError::TestCaseNotFound(case_id.to_string()))?;
        self.latest.write().remove(case_id);
        Ok(removed)
    }

    pub fn case_count(&self) -> usize {
        self.cases.read().len()
    }

    pub fn set_publisher(&self, publisher: Arc<dyn SnapshotPublisher>) {
        *self.publisher.write() = Some(publisher);
    }

    /// Run `candidate` against one registered case.
    ///
    /// Only an unknown case id is an error. Candidate failures come back as a
    /// zero-score INSUFFICIENT result.
    pub fn run_validation(
        &self,
        case_id: &str,
        candidate: &Candidate,
    ) -> EquivalenceResult<ValidationResult> {
        let case = self
            .cases
            .read()
            .get(case_id)
            .cloned()
            .ok_or_else(|| EquivalenceError::TestCaseNotFound(case_id.to_string()))?;

        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| candidate(&case.input)));
        let elapsed = started.elapsed();

        let (output, failure) = match outcome {
            Ok(Ok(output)) => (Some(output), None),
            Ok(Err(e)) => (None, Some(format!("candidate failed: {}", e))),
            Err(_) => (None, Some("candidate panicked".to_string())),
        };

        let score = match (&output, case.validation_type) {
            (None, _) => 0.0,
            (Some(out), ValidationType::Exact) => score_exact(&case.expected, out),
            (Some(out), ValidationType::Structural) => score_structural(&case.expected, out),
            (Some(out), ValidationType::Performance) => match case.max_response_time {
                Some(max) => score_performance(elapsed, max),
                None => score_structural(&case.expected, out),
            },
        };

        let level = if failure.is_some() {
            EquivalenceLevel::Insufficient
        } else {
            bucket(score, &self.config)
        };
        let success = failure.is_none() && score >= self.config.medium_threshold;

        match &failure {
            Some(reason) => error!(case = %case.id, reason = %reason, "Candidate execution failed"),
            None if !success => warn!(case = %case.id, score = score, level = %level, "Equivalence below threshold"),
            None => debug!(case = %case.id, score = score, level = %level, "Equivalence validated"),
        }

        let result = ValidationResult {
            case_id: case.id.clone(),
            score,
            level,
            success,
            critical: case.critical,
            elapsed,
            output,
            error: failure,
            timestamp: Utc::now(),
        };

        self.latest.write().insert(case.id, result.clone());
        Ok(result)
    }

    /// Run every case that has a candidate; skip and log the rest.
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub fn run_full_validation(
        &self,
        candidates: &BTreeMap<String, Box<Candidate>>,
    ) -> FullValidationSummary {
        let case_ids: Vec<String> = self.cases.read().keys().cloned().collect();

        let mut results = Vec::new();
        let mut skipped = Vec::new();
        for id in &case_ids {
            match candidates.get(id) {
                Some(candidate) => {
                    if let Ok(result) = self.run_validation(id, candidate.as_ref()) {
                        results.push(result);
                    }
                }
                None => skipped.push(id.clone()),
            }
        }

        let unknown: Vec<String> = candidates
            .keys()
            .filter(|k| !case_ids.contains(*k))
            .cloned()
            .collect();

        if !skipped.is_empty() {
            info!(skipped = ?skipped, "Test cases skipped without candidate");
        }
        if !unknown.is_empty() {
            warn!(unknown = ?unknown, "Candidates supplied for unknown test cases");
        }

        let metrics = self.metrics();
        info!(
            overall = metrics.overall_score,
            passed = metrics.passed_tests,
            failed = metrics.failed_tests,
            "Full validation complete"
        );

        FullValidationSummary {
            results,
            skipped,
            unknown,
            metrics,
        }
    }

    /// Aggregate over the latest result per case.
    ///
    /// `critical_weight * critical_mean + (1 - critical_weight) * normal_mean`
    /// when both groups have results, the one group's mean otherwise, and 1.0
    /// with no results at all.
    pub fn metrics(&self) -> EquivalenceMetrics {
        let latest = self.latest.read();

        let mean = |critical: bool| -> Option<f64> {
            let scores: Vec<f64> = latest
                .values()
                .filter(|r| r.critical == critical)
                .map(|r| r.score)
                .collect();
            if scores.is_empty() {
                None
            } else {
                Some(scores.iter().sum::<f64>() / scores.len() as f64)
            }
        };
        let critical_score = mean(true);
        let normal_score = mean(false);

        let w = self.config.critical_weight;
        let overall_score = match (critical_score, normal_score) {
            (Some(c), Some(n)) => w * c + (1.0 - w) * n,
            (Some(c), None) => c,
            (None, Some(n)) => n,
            (None, None) => 1.0,
        };

        let passed_tests = latest.values().filter(|r| r.success).count();
        EquivalenceMetrics {
            overall_score,
            critical_score,
            normal_score,
            total_tests: latest.len(),
            passed_tests,
            failed_tests: latest.len() - passed_tests,
            last_validation: latest.values().map(|r| r.timestamp).max(),
        }
    }

    pub fn overall_score(&self) -> f64 {
        self.metrics().overall_score
    }

    /// Forget every result. The aggregate returns to its vacuous 1.0.
    pub fn reset_results(&self) {
        let cleared = {
            let mut latest = self.latest.write();
            let n = latest.len();
            latest.clear();
            n
        };
        info!(cleared = cleared, "Equivalence results reset");
    }

    /// Current metrics as a publishable snapshot.
    pub fn snapshot(&self) -> Map<String, Value> {
        let m = self.metrics();
        let mut snapshot = Map::new();
        snapshot.insert("overall_score".into(), json!(m.overall_score));
        snapshot.insert("critical_score".into(), json!(m.critical_score));
        snapshot.insert("normal_score".into(), json!(m.normal_score));
        snapshot.insert("total_tests".into(), json!(m.total_tests));
        snapshot.insert("passed_tests".into(), json!(m.passed_tests));
        snapshot.insert("failed_tests".into(), json!(m.failed_tests));
        snapshot.insert(
            "last_validation".into(),
            json!(m.last_validation.map(|t| t.to_rfc3339())),
        );
        snapshot
    }

    /// Push the current snapshot to the publisher, if one is attached.
    ///
    /// Returns whether the snapshot was delivered. Publisher failures and
    /// panics are logged and otherwise ignored.
    pub fn publish_equivalence_snapshot(&self) -> bool {
        let snapshot = self.snapshot();
        self.publish(&snapshot)
    }

    /// Push an arbitrary snapshot through the publisher.
    pub fn publish(&self, snapshot: &Map<String, Value>) -> bool {
        let Some(publisher) = self.publisher.read().clone() else {
            debug!("No snapshot publisher attached; snapshot kept local");
            return false;
        };

        match catch_unwind(AssertUnwindSafe(|| publisher.publish(snapshot))) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Snapshot publisher failed; snapshot kept local");
                false
            }
            Err(_) => {
                warn!("Snapshot publisher panicked; snapshot kept local");
                false
            }
        }
    }

    /// Check the configured golden set against `expected_hash`.
    pub fn verify_golden_set_integrity(&self, expected_hash: &str) -> GoldenSetVerification {
        verify_golden_set(self.config.golden_set_path.as_deref(), expected_hash)
    }

    pub fn report(&self) -> EquivalenceReport {
        let (registered_cases, critical_cases) = {
            let cases = self.cases.read();
            (cases.len(), cases.values().filter(|c| c.critical).count())
        };
        let mut latest: Vec<ValidationResult> = self.latest.read().values().cloned().collect();
        latest.sort_by(|a, b| a.case_id.cmp(&b.case_id));

        EquivalenceReport {
            metrics: self.metrics(),
            registered_cases,
            critical_cases,
            latest,
            publisher_attached: self.publisher.read().is_some(),
        }
    }
}

impl Default for EquivalenceValidator {
    fn default() -> Self {
        Self::new(EquivalenceConfig::default())
    }
}
