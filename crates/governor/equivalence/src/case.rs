//! Test cases and their results.

use std::time::Duration;

use chrono::{DateTime, Utc};
use maple_governor_types::EquivalenceLevel;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scoring::ValidationType;

/// A baseline expectation for one input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub input: Value,
    pub expected: Value,
    pub validation_type: ValidationType,
    /// Bound for `Performance` cases.
    pub max_response_time: Option<Duration>,
    /// Critical cases weigh more in the aggregate score.
    pub critical: bool,
    pub description: String,
}

impl TestCase {
    /// A non-critical structural case.
    pub fn new(id: impl Into<String>, input: Value, expected: Value) -> Self {
        Self {
            id: id.into(),
            input,
            expected,
            validation_type: ValidationType::Structural,
            max_response_time: None,
            critical: false,
            description: String::new(),
        }
    }

    pub fn exact(mut self) -> Self {
        self.validation_type = ValidationType::Exact;
        self
    }

    pub fn performance(mut self, max_response_time: Duration) -> Self {
        self.validation_type = ValidationType::Performance;
        self.max_response_time = Some(max_response_time);
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Result of running a candidate against one case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub case_id: String,
    pub score: f64,
    pub level: EquivalenceLevel,
    /// Score reached the medium threshold.
    pub success: bool,
    pub critical: bool,
    pub elapsed: Duration,
    pub output: Option<Value>,
    /// Set when the candidate failed or panicked.
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate over the latest result of every case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquivalenceMetrics {
    /// 1.0 when nothing has run yet.
    pub overall_score: f64,
    pub critical_score: Option<f64>,
    pub normal_score: Option<f64>,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub last_validation: Option<DateTime<Utc>>,
}

impl Default for EquivalenceMetrics {
    fn default() -> Self {
        Self {
            overall_score: 1.0,
            critical_score: None,
            normal_score: None,
            total_tests: 0,
            passed_tests: 0,
            failed_tests: 0,
            last_validation: None,
        }
    }
}

/// Summary of a `run_full_validation` pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullValidationSummary {
    pub results: Vec<ValidationResult>,
    /// Registered cases with no candidate supplied.
    pub skipped: Vec<String>,
    /// Candidates supplied for unknown case ids.
    pub unknown: Vec<String>,
    pub metrics: EquivalenceMetrics,
}

/// Read-only view of the validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquivalenceReport {
    pub metrics: EquivalenceMetrics,
    pub registered_cases: usize,
    pub critical_cases: usize,
    pub latest: Vec<ValidationResult>,
    pub publisher_attached: bool,
}
