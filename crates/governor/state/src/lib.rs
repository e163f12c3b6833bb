//! # maple-governor-state
//!
//! The StateManager: single source of truth for the governed system's state,
//! its consolidated metrics, and the event bus every other component watches.
//!
//! ## Features
//!
//! - **Authoritative state**: one `SystemState`, with an append-only
//!   transition history
//! - **Repairing metrics**: every metric update is sanitized field by field;
//!   bad input is repaired and reported, never rejected
//! - **Merge-only equivalence snapshots**: publishers cannot clobber fields
//!   they do not own
//! - **Two event paths**: topic listeners (`add_listener`) and a broadcast
//!   channel (`subscribe`)
//! - **Isolated listeners**: a listener that errors or panics is logged and
//!   skipped
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use maple_governor_state::{MetricsUpdate, StateManager, StateTopic};
//! use maple_governor_types::SystemState;
//!
//! let manager = Arc::new(StateManager::new());
//! manager.add_listener(StateTopic::StateChange, |event| {
//!     println!("{:?}", event);
//!     Ok(())
//! });
//!
//! manager.change_state(SystemState::Ready, "boot complete", serde_json::Value::Null);
//! let report = manager.update_metrics(MetricsUpdate::new().current_wip(-5));
//! assert_eq!(report.metrics.current_wip, 0);
//! ```

pub mod error;
pub mod events;
pub mod manager;
pub mod metrics;

pub use error::{StateError, StateResult};
pub use events::{
    nominal_routing, EmergencyStopNotice, Listener, ListenerId, StateEvent, StateTopic,
    StateTransition,
};
pub use manager::{StateManager, OVERALL_SCORE_KEY};
pub use metrics::{
    parse_state_lenient, sanitize_count, sanitize_ratio, sanitize_unit, MetricRepair,
    MetricsUpdate, MetricsUpdateReport, Sanitized, SystemMetrics, WorkloadLevel,
};
