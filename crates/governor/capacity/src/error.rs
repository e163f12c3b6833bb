//! Error types for capacity governance.

use maple_governor_types::{WorkItemId, WorkStatus};
use thiserror::Error;

/// Errors from capacity governance operations.
///
/// Admission refusals (WIP full, unmet dependencies, active blockers) are not
/// errors; they come back as [`StartOutcome::Rejected`](crate::StartOutcome).
#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("work item already exists: {0}")]
    DuplicateWorkItem(WorkItemId),

    #[error("work item not found: {0}")]
    WorkItemNotFound(WorkItemId),

    /// A field outside its allowed range.
    #[error("invalid work item {id}: {reason}")]
    InvalidWorkItem { id: WorkItemId, reason: String },

    #[error("work item {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: WorkItemId,
        from: WorkStatus,
        to: WorkStatus,
    },

    #[error("invalid capacity configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for capacity governance operations.
pub type CapacityResult<T> = Result<T, CapacityError>;
