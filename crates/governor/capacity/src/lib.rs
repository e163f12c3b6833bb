//! # maple-governor-capacity
//!
//! CapacityGovernance: admission control for concurrent work.
//!
//! - Work items move `pending -> in_progress -> completed`, or to `blocked`
//! - Starts are gated by the WIP ceiling, by dependencies (all completed)
//!   and by blockers (none active or blocked)
//! - Completions feed daily / weekly lines-of-code and file quotas and a
//!   moving average of completion time
//! - Pending work is ranked by `(risk x impact) / workload`, weighted by SLO
//!   priority and by dependency structure
//!
//! ```rust
//! use maple_governor_capacity::{CapacityConfig, CapacityGovernance};
//! use maple_governor_types::{WorkItem, WorkItemId};
//!
//! let capacity = CapacityGovernance::new(CapacityConfig::default());
//! capacity.add_work_item(WorkItem::new("task-1", "Ship it").with_estimates(4, 2, 3))?;
//! assert!(capacity.start_work_item(&WorkItemId::new("task-1"))?.is_started());
//! # Ok::<(), maple_governor_capacity::CapacityError>(())
//! ```

pub mod config;
pub mod counters;
pub mod error;
pub mod governance;
pub mod priority;

pub use config::CapacityConfig;
pub use counters::{ema, ResourceCounters};
pub use error::{CapacityError, CapacityResult};
pub use governance::{
    CapacityGovernance, CapacityLimits, CapacityMetrics, CapacityReport, QueueEntry,
    StartOutcome, StartRejection, StatusCounts,
};
pub use priority::{dependency_weight, PriorityScore, BLOCKER_WEIGHT, DEPENDENCY_WEIGHT};
