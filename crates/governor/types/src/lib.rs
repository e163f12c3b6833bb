//! # maple-governor-types
//!
//! Shared vocabulary for the Governor control plane.
//!
//! The Governor supervises a running system: it gates work-item throughput
//! against capacity quotas, checks that candidate behaviour stays equivalent to
//! a trusted baseline, folds both signals together with pluggable invariants
//! into one safety posture, and escalates to an emergency stop when that
//! posture degrades.
//!
//! This crate holds only data types. Behaviour lives in the component crates:
//!
//! - `maple-governor-state`: single source of truth for state and metrics
//! - `maple-governor-safety`: invariant registry and safety scoring
//! - `maple-governor-capacity`: WIP admission control and quotas
//! - `maple-governor-equivalence`: baseline-vs-candidate validation
//! - `maple-governor-integration`: the orchestrator and stop policies

pub mod ids;
pub mod levels;
pub mod state;
pub mod stop;
pub mod work;

pub use ids::{StopRecordId, WorkItemId};
pub use levels::{ComponentHealth, EquivalenceLevel, SafetyLevel};
pub use state::{IntegrationStatus, SystemState};
pub use stop::{StopPolicy, StopTrigger};
pub use work::{PriorityLevel, WorkItem, WorkStatus};
