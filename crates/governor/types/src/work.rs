//! Work items tracked by capacity governance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::WorkItemId;

/// Service-level priority of a work item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl PriorityLevel {
    /// SLO multiplier applied to the base priority score.
    pub fn slo_weight(&self) -> f64 {
        match self {
            PriorityLevel::Critical => 2.0,
            PriorityLevel::High => 1.5,
            PriorityLevel::Medium => 1.0,
            PriorityLevel::Low => 0.75,
        }
    }
}

/// Lifecycle status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl WorkStatus {
    /// Allowed moves: pending -> in_progress -> completed, and
    /// pending / in_progress -> blocked.
    pub fn can_transition_to(&self, next: WorkStatus) -> bool {
        matches!(
            (self, next),
            (WorkStatus::Pending, WorkStatus::InProgress)
                | (WorkStatus::InProgress, WorkStatus::Completed)
                | (WorkStatus::Pending, WorkStatus::Blocked)
                | (WorkStatus::InProgress, WorkStatus::Blocked)
        )
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkStatus::Pending => "pending",
            WorkStatus::InProgress => "in_progress",
            WorkStatus::Completed => "completed",
            WorkStatus::Blocked => "blocked",
        };
        write!(f, "{}", s)
    }
}

/// A unit of work admitted through capacity governance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub title: String,
    pub priority: PriorityLevel,
    /// Estimated workload, 0-10.
    pub estimated_workload: u8,
    /// Risk, 1-10.
    pub risk: u8,
    /// Impact, 1-10.
    pub impact: u8,
    /// Items that must be completed before this one can start.
    pub dependencies: Vec<WorkItemId>,
    /// Items that must not be active or blocked while this one starts.
    pub blockers: Vec<WorkItemId>,
    pub status: WorkStatus,
    pub actual_workload: Option<u8>,
    pub blocked_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    /// New pending item with medium priority and mid-range estimates.
    pub fn new(id: impl Into<WorkItemId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            priority: PriorityLevel::default(),
            estimated_workload: 5,
            risk: 5,
            impact: 5,
            dependencies: Vec::new(),
            blockers: Vec::new(),
            status: WorkStatus::Pending,
            actual_workload: None,
            blocked_reason: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_priority(mut self, priority: PriorityLevel) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_estimates(mut self, workload: u8, risk: u8, impact: u8) -> Self {
        self.estimated_workload = workload;
        self.risk = risk;
        self.impact = impact;
        self
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = WorkItemId>) -> Self {
        self.dependencies = deps.into_iter().collect();
        self
    }

    pub fn with_blockers(mut self, blockers: impl IntoIterator<Item = WorkItemId>) -> Self {
        self.blockers = blockers.into_iter().collect();
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkStatus::InProgress
    }
}

impl From<String> for WorkItemId {
    fn from(value: String) -> Self {
        WorkItemId::new(value)
    }
}
