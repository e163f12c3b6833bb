//! Error types for the safety framework.

use thiserror::Error;

/// Errors from safety framework operations.
#[derive(Debug, Error)]
pub enum SafetyError {
    /// An invariant with this id is already registered.
    #[error("invariant already registered: {0}")]
    DuplicateInvariant(String),

    /// No invariant with this id is registered.
    #[error("invariant not found: {0}")]
    InvariantNotFound(String),

    /// Rejected configuration.
    #[error("invalid safety configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for safety framework operations.
pub type SafetyResult<T> = Result<T, SafetyError>;
