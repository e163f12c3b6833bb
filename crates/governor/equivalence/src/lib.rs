//! # maple-governor-equivalence
//!
//! EquivalenceValidator: checks that a candidate implementation keeps
//! behaving like a trusted baseline.
//!
//! - Test cases pair an input with the expected output and a comparison
//!   type (exact, structural, performance)
//! - Candidates are plain `(input) -> output` functions; failures and panics
//!   score zero instead of propagating
//! - Scores bucket into EXACT / HIGH / MEDIUM / LOW / INSUFFICIENT
//! - The aggregate weights critical cases 0.7 and is 1.0 before any case has
//!   run, so missing evidence never causes a stop by itself
//! - A blake3 hash over the golden fixture tree gates promotion with a
//!   200 / 422 status
//! - Snapshots go out through an injected [`SnapshotPublisher`]

pub mod case;
pub mod config;
pub mod error;
pub mod golden;
pub mod scoring;
pub mod validator;

pub use case::{
    EquivalenceMetrics, EquivalenceReport, FullValidationSummary, TestCase, ValidationResult,
};
pub use config::EquivalenceConfig;
pub use error::{EquivalenceError, EquivalenceResult};
pub use golden::{
    hash_golden_set, verify_golden_set, GoldenSetVerification, STATUS_OK, STATUS_UNPROCESSABLE,
};
pub use scoring::{bucket, score_structural, text_similarity, ValidationType};
pub use validator::{
    null_snapshot, Candidate, EquivalenceValidator, SnapshotPublisher, SNAPSHOT_KEYS,
};
