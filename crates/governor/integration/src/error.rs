//! Error types for the integrated safety system.

use maple_governor_capacity::CapacityError;
use maple_governor_equivalence::EquivalenceError;
use maple_governor_safety::SafetyError;
use thiserror::Error;

/// Errors from the integrated safety system.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// Configuration rejected by validation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Work cannot start while an emergency stop is active.
    #[error("emergency stop active: work admission refused")]
    EmergencyStopActive,

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error(transparent)]
    Safety(#[from] SafetyError),

    #[error(transparent)]
    Equivalence(#[from] EquivalenceError),
}

/// Result type for integrated safety system operations.
pub type IntegrationResult<T> = Result<T, IntegrationError>;
