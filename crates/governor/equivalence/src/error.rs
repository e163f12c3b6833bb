//! Error types for the equivalence validator.

use thiserror::Error;

/// Errors from equivalence validator operations.
///
/// A candidate that fails or panics is not an error: it produces a zero
/// score. Errors here are caller mistakes and I/O.
#[derive(Debug, Error)]
pub enum EquivalenceError {
    #[error("test case not found: {0}")]
    TestCaseNotFound(String),

    #[error("test case already registered: {0}")]
    DuplicateTestCase(String),

    #[error("golden set I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("golden set walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid equivalence configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for equivalence validator operations.
pub type EquivalenceResult<T> = Result<T, EquivalenceError>;
