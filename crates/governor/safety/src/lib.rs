//! # maple-governor-safety
//!
//! The SafetyFramework: a registry of pluggable invariants folded into one
//! safety level and score.
//!
//! - Invariants are async predicates ([`SafetyInvariant`]); closures plug in
//!   through [`FnInvariant`] and [`AsyncFnInvariant`]
//! - A check is CRITICAL if any critical invariant fails, HIGH if any
//!   invariant fails, otherwise SAFE
//! - Errors and panics inside an invariant are violations, never crashes
//! - The score is clamped into a configured band, with two-threshold
//!   hysteresis on a drift signal driving "critical mode"
//! - [`SafetyFramework::emergency_stop`] disables the framework until it is
//!   re-enabled

pub mod config;
pub mod error;
pub mod framework;
pub mod invariant;
pub mod score;

pub use config::SafetyConfig;
pub use error::{SafetyError, SafetyResult};
pub use framework::{InvariantOutcome, InvariantStatus, SafetyCheck, SafetyFramework, SafetyReport};
pub use invariant::{AsyncFnInvariant, FnInvariant, SafetyInvariant};
pub use score::{FinalScore, ScoreFinalizer};
