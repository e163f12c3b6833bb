//! Error types for the state manager.

use thiserror::Error;

use crate::events::ListenerId;

/// Errors from state manager operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// A listener id that was never registered, or was already removed.
    #[error("listener not found: {0}")]
    ListenerNotFound(ListenerId),

    /// A host-supplied listener returned an error.
    #[error("listener {id} failed: {reason}")]
    ListenerFailed { id: ListenerId, reason: String },
}

/// Result type for state manager operations.
pub type StateResult<T> = Result<T, StateError>;
