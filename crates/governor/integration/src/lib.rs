//! # maple-governor-integration
//!
//! The integrated safety system: one orchestrator over safety, capacity and
//! equivalence that turns their signals into a status, a composite score and,
//! when needed, an emergency stop.
//!
//! ## Stop policies
//!
//! | Trigger | Severity | Policy |
//! |---|---|---|
//! | `ObservabilityMissing` | any | `Gradual` |
//! | `EquivalenceViolation` | >= 0.9 | `Immediate` |
//! | `EquivalenceViolation` | < 0.9 | `Hysteresis` |
//! | `PerformanceThreshold` | >= 0.8 | `Immediate` |
//! | `PerformanceThreshold` | < 0.8 | `Hysteresis` |
//!
//! `Hysteresis` fires after N violations within T and never during a
//! trigger's post-stop warmup. A higher-priority policy replaces an active
//! lower one (`Immediate` > `Hysteresis` > `Gradual`). If carrying out a stop
//! fails, the system forces a hard stop.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use maple_governor_integration::{GovernorConfig, IntegratedSafetySystem};
//! use maple_governor_state::StateManager;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let state = Arc::new(StateManager::new());
//! let config = GovernorConfig::load(None)?;
//! let system = IntegratedSafetySystem::start(config, state).await?;
//!
//! let checkpoint = system.run_integration_check().await;
//! println!("status: {}", checkpoint.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod hook;
pub mod hysteresis;
pub mod policy;
pub mod report;
pub mod system;

pub use config::{BootConfig, GovernorConfig, HysteresisConfig, StopPolicyConfig};
pub use error::{IntegrationError, IntegrationResult};
pub use hook::{EmergencyStopHook, FailingStopHook, NoOpStopHook};
pub use hysteresis::{HysteresisTracker, TriggerWindowStatus};
pub use policy::{
    resolve_policy, sanitize_severity, EmergencyStopOutcome, EmergencyStopRecord, StopDecision,
};
pub use report::{
    ComponentStatus, HealthReport, IntegrationCheckpoint, IntegrationReport, RecoveryReport,
    StopConditions,
};
pub use system::{
    IntegratedSafetySystem, CAPACITY_INVARIANT, EQUIVALENCE_INVARIANT, STATE_SAFETY_INVARIANT,
};
