//! WIP admission control.
//!
//! All mutable state sits behind one mutex, so a WIP change and the status
//! transition that licenses it are a single critical section. No reader ever
//! sees an item in progress without its WIP slot, or the reverse.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use maple_governor_types::{WorkItem, WorkItemId, WorkStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CapacityConfig;
use crate::counters::{ema, ResourceCounters};
use crate::error::{CapacityError, CapacityResult};
use crate::priority::PriorityScore;

/// Why a start was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StartRejection {
    WipLimitReached { current: u32, limit: u32 },
    UnmetDependencies { pending: Vec<WorkItemId> },
    ActiveBlockers { blockers: Vec<WorkItemId> },
    InvalidStatus { status: WorkStatus },
}

/// Result of asking to start a work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartOutcome {
    Started,
    Rejected(StartRejection),
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, StartOutcome::Started)
    }
}

/// Capacity gates.
///
/// `wip_ok` is inclusive (`wip <= limit`) while `can_add_work` is strict
/// (`wip < limit`): a full system is within limits but admits nothing new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityLimits {
    pub daily_loc_ok: bool,
    pub weekly_loc_ok: bool,
    pub daily_files_ok: bool,
    pub weekly_files_ok: bool,
    pub wip_ok: bool,
    pub can_add_work: bool,
}

impl CapacityLimits {
    /// Every quota gate holds. `can_add_work` is admission, not a quota.
    pub fn all_ok(&self) -> bool {
        self.daily_loc_ok
            && self.weekly_loc_ok
            && self.daily_files_ok
            && self.weekly_files_ok
            && self.wip_ok
    }

    pub fn violations(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.daily_loc_ok {
            out.push("daily_loc");
        }
        if !self.weekly_loc_ok {
            out.push("weekly_loc");
        }
        if !self.daily_files_ok {
            out.push("daily_files");
        }
        if !self.weekly_files_ok {
            out.push("weekly_files");
        }
        if !self.wip_ok {
            out.push("wip");
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityMetrics {
    pub current_wip: u32,
    pub wip_limit: u32,
    /// Limit applied to new starts.
    pub admission_limit: u32,
    pub normal_wip_limit: u32,
    pub temporary_wip_limit: u32,
    pub temporary_increase_active: bool,
    pub conservative_mode: bool,
    pub daily_loc: u64,
    pub weekly_loc: u64,
    pub daily_files: u64,
    pub weekly_files: u64,
    /// Moving average of start-to-completion time, in hours.
    pub avg_completion_hours: Option<f64>,
    pub total_completed: u64,
    /// current_wip / wip_limit.
    pub utilization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: WorkItemId,
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub blocked: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityReport {
    pub metrics: CapacityMetrics,
    pub limits: CapacityLimits,
    pub counts: StatusCounts,
    pub queue: Vec<QueueEntry>,
}

struct CapacityState {
    items: HashMap<WorkItemId, WorkItem>,
    scores: HashMap<WorkItemId, Vec<PriorityScore>>,
    current_wip: u32,
    temporary_active: bool,
    /// Restore requested while WIP was above the normal ceiling.
    restore_pending: bool,
    conservative: bool,
    counters: ResourceCounters,
    avg_completion_hours: Option<f64>,
    total_completed: u64,
}

/// Capacity governance: WIP admission, quotas and the priority queue.
pub struct CapacityGovernance {
    config: CapacityConfig,
    state: Mutex<CapacityState>,
}

impl CapacityGovernance {
    pub fn new(config: CapacityConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CapacityState {
                items: HashMap::new(),
                scores: HashMap::new(),
                current_wip: 0,
                temporary_active: false,
                restore_pending: false,
                conservative: false,
                counters: ResourceCounters::new(Utc::now().date_naive()),
                avg_completion_hours: None,
                total_completed: 0,
            }),
        }
    }

    pub fn config(&self) -> &CapacityConfig {
        &self.config
    }

    /// Register a pending work item and score it.
    pub fn add_work_item(&self, item: WorkItem) -> CapacityResult<PriorityScore> {
        validate_item(&item)?;

        let mut state = self.state.lock();
        if state.items.contains_key(&item.id) {
            return Err(CapacityError::DuplicateWorkItem(item.id));
        }

        let score = PriorityScore::compute(&item);
        info!(
            work_item = %item.id,
            priority = ?item.priority,
            score = score.final_score,
            "Work item added"
        );
        state.scores.insert(item.id.clone(), vec![score]);
        state.items.insert(item.id.clone(), item);
        Ok(score)
    }

    /// Try to start a pending item.
    ///
    /// Refusals are returned as [`StartOutcome::Rejected`]; only an unknown
    /// id is an error.
    pub fn start_work_item(&self, id: &WorkItemId) -> CapacityResult<StartOutcome> {
        let mut state = self.state.lock();
        let limit = self.admission_limit_of(&state);

        let item = state
            .items
            .get(id)
            .ok_or_else(|| CapacityError::WorkItemNotFound(id.clone()))?;

        let rejection = if item.status != WorkStatus::Pending {
            Some(StartRejection::InvalidStatus {
                status: item.status,
            })
        } else if state.current_wip >= limit {
            Some(StartRejection::WipLimitReached {
                current: state.current_wip,
                limit,
            })
        } else {
            let pending: Vec<WorkItemId> = item
                .dependencies
                .iter()
                .filter(|dep| {
                    state
                        .items
                        .get(*dep)
                        .map_or(true, |d| d.status != WorkStatus::Completed)
                })
                .cloned()
                .collect();
            let blockers: Vec<WorkItemId> = item
                .blockers
                .iter()
                .filter(|b| {
                    state.items.get(*b).is_some_and(|b| {
                        matches!(b.status, WorkStatus::InProgress | WorkStatus::Blocked)
                    })
                })
                .cloned()
                .collect();

            if !pending.is_empty() {
                Some(StartRejection::UnmetDependencies { pending })
            } else if !blockers.is_empty() {
                Some(StartRejection::ActiveBlockers { blockers })
            } else {
                None
            }
        };

        if let Some(rejection) = rejection {
            debug!(work_item = %id, rejection = ?rejection, "Work item start refused");
            return Ok(StartOutcome::Rejected(rejection));
        }

        state.current_wip += 1;
        let wip = state.current_wip;
        if let Some(item) = state.items.get_mut(id) {
            item.status = WorkStatus::InProgress;
            item.started_at = Some(Utc::now());
        }
        info!(work_item = %id, wip = wip, limit = limit, "Work item started");
        Ok(StartOutcome::Started)
    }

    /// Complete an in-progress item and account for the change it made.
    pub fn complete_work_item(
        &self,
        id: &WorkItemId,
        actual_workload: u8,
        loc_change: u64,
        file_change: u64,
    ) -> CapacityResult<WorkItem> {
        self.complete_at(id, actual_workload, loc_change, file_change, Utc::now())
    }

    pub(crate) fn complete_at(
        &self,
        id: &WorkItemId,
        actual_workload: u8,
        loc_change: u64,
        file_change: u64,
        now: DateTime<Utc>,
    ) -> CapacityResult<WorkItem> {
        let mut state = self.state.lock();
        let alpha = self.config.completion_ema_alpha;

        let item = state
            .items
            .get_mut(id)
            .ok_or_else(|| CapacityError::WorkItemNotFound(id.clone()))?;
        if item.status != WorkStatus::InProgress {
            return Err(CapacityError::InvalidTransition {
                id: id.clone(),
                from: item.status,
                to: WorkStatus::Completed,
            });
        }

        item.status = WorkStatus::Completed;
        item.actual_workload = Some(actual_workload);
        item.completed_at = Some(now);
        let hours = item
            .started_at
            .map(|started| (now - started).num_milliseconds().max(0) as f64 / 3_600_000.0);
        let completed = item.clone();

        state.current_wip = state.current_wip.saturating_sub(1);
        self.settle_restore(&mut state);
        roll(&mut state.counters, now.date_naive());
        state.counters.record(loc_change, file_change);
        if let Some(hours) = hours {
            state.avg_completion_hours = Some(ema(state.avg_completion_hours, hours, alpha));
        }
        state.total_completed += 1;

        info!(
            work_item = %id,
            wip = state.current_wip,
            loc = loc_change,
            files = file_change,
            "Work item completed"
        );
        Ok(completed)
    }

    /// Block a pending or in-progress item, freeing its WIP slot if it held one.
    pub fn block_work_item(&self, id: &WorkItemId, reason: impl Into<String>) -> CapacityResult<()> {
        let reason = reason.into();
        let mut state = self.state.lock();

        let item = state
            .items
            .get_mut(id)
            .ok_or_else(|| CapacityError::WorkItemNotFound(id.clone()))?;
        if !item.status.can_transition_to(WorkStatus::Blocked) {
            return Err(CapacityError::InvalidTransition {
                id: id.clone(),
                from: item.status,
                to: WorkStatus::Blocked,
            });
        }

        let was_active = item.is_active();
        item.status = WorkStatus::Blocked;
        item.blocked_reason = Some(reason.clone());
        if was_active {
            state.current_wip = state.current_wip.saturating_sub(1);
            self.settle_restore(&mut state);
        }

        warn!(work_item = %id, reason = %reason, freed_wip = was_active, "Work item blocked");
        Ok(())
    }

    pub fn check_capacity_limits(&self) -> CapacityLimits {
        let mut state = self.state.lock();
        roll(&mut state.counters, Utc::now().date_naive());
        self.limits(&state)
    }

    /// Raise the ceiling to the temporary limit. Idempotent.
    pub fn request_wip_increase(&self, reason: &str) -> u32 {
        let mut state = self.state.lock();
        state.restore_pending = false;
        if !state.temporary_active {
            state.temporary_active = true;
            info!(
                reason = reason,
                limit = self.config.temporary_wip_limit,
                "Temporary WIP increase granted"
            );
        }
        self.active_limit(&state)
    }

    /// Drop back to the normal ceiling. Idempotent.
    ///
    /// The ceiling never drops below the current WIP: while more items are
    /// in progress than the normal limit allows, the restore is deferred and
    /// applied once enough of them complete or block. Admission follows the
    /// normal limit immediately.
    pub fn restore_normal_wip_limit(&self) -> u32 {
        let mut state = self.state.lock();
        if state.temporary_active {
            if state.current_wip > self.config.normal_wip_limit {
                if !state.restore_pending {
                    state.restore_pending = true;
                    info!(
                        wip = state.current_wip,
                        limit = self.config.normal_wip_limit,
                        "Normal WIP limit restore deferred until WIP drains"
                    );
                }
            } else {
                state.temporary_active = false;
                info!(limit = self.config.normal_wip_limit, "Normal WIP limit restored");
            }
        }
        self.active_limit(&state)
    }

    /// Tighten admission for the conservative fallback. Items already in
    /// progress keep running and the WIP ceiling itself is unchanged.
    /// Returns the admission limit.
    pub fn enter_conservative_mode(&self) -> u32 {
        let mut state = self.state.lock();
        if !state.conservative {
            state.conservative = true;
            warn!(
                admission_limit = self.admission_limit_of(&state),
                wip = state.current_wip,
                "Capacity conservative mode entered"
            );
        }
        self.admission_limit_of(&state)
    }

    pub fn exit_conservative_mode(&self) -> u32 {
        let mut state = self.state.lock();
        if state.conservative {
            state.conservative = false;
            info!("Capacity conservative mode exited");
        }
        self.admission_limit_of(&state)
    }

    pub fn is_conservative(&self) -> bool {
        self.state.lock().conservative
    }

    pub fn current_wip(&self) -> u32 {
        self.state.lock().current_wip
    }

    /// The WIP ceiling: the normal limit, or the temporary one while an
    /// increase is active.
    pub fn wip_limit(&self) -> u32 {
        let state = self.state.lock();
        self.active_limit(&state)
    }

    /// Limit applied to new starts. Tighter than [`wip_limit`](Self::wip_limit)
    /// in conservative mode or while a restore is deferred.
    pub fn admission_limit(&self) -> u32 {
        let state = self.state.lock();
        self.admission_limit_of(&state)
    }

    pub fn work_item(&self, id: &WorkItemId) -> Option<WorkItem> {
        self.state.lock().items.get(id).cloned()
    }

    pub fn work_items(&self) -> Vec<WorkItem> {
        self.state.lock().items.values().cloned().collect()
    }

    /// Latest scores of every item, newest last per item.
    pub fn score_history(&self, id: &WorkItemId) -> Vec<PriorityScore> {
        self.state.lock().scores.get(id).cloned().unwrap_or_default()
    }

    /// Append a fresh score for every pending item.
    pub fn recalculate_priorities(&self) -> usize {
        let mut state = self.state.lock();
        let fresh: Vec<(WorkItemId, PriorityScore)> = state
            .items
            .values()
            .filter(|i| i.status == WorkStatus::Pending)
            .map(|i| (i.id.clone(), PriorityScore::compute(i)))
            .collect();

        let count = fresh.len();
        for (id, score) in fresh {
            state.scores.entry(id).or_default().push(score);
        }
        debug!(items = count, "Priorities recalculated");
        count
    }

    /// Pending items ordered by their most recent score, highest first.
    pub fn get_priority_queue(&self) -> Vec<QueueEntry> {
        let state = self.state.lock();
        queue(&state)
    }

    pub fn metrics(&self) -> CapacityMetrics {
        let state = self.state.lock();
        self.metrics_of(&state)
    }

    pub fn report(&self) -> CapacityReport {
        let mut state = self.state.lock();
        roll(&mut state.counters, Utc::now().date_naive());

        let mut counts = StatusCounts::default();
        for item in state.items.values() {
            match item.status {
                WorkStatus::Pending => counts.pending += 1,
                WorkStatus::InProgress => counts.in_progress += 1,
                WorkStatus::Completed => counts.completed += 1,
                WorkStatus::Blocked => counts.blocked += 1,
            }
        }

        CapacityReport {
            metrics: self.metrics_of(&state),
            limits: self.limits(&state),
            counts,
            queue: queue(&state),
        }
    }

    #[cfg(test)]
    pub(crate) fn roll_counters_to(&self, today: NaiveDate) -> (bool, bool) {
        self.state.lock().counters.roll(today)
    }

    fn active_limit(&self, state: &CapacityState) -> u32 {
        if state.temporary_active {
            self.config.temporary_wip_limit
        } else {
            self.config.normal_wip_limit
        }
    }

    fn admission_limit_of(&self, state: &CapacityState) -> u32 {
        let mut limit = self.active_limit(state);
        if state.restore_pending {
            limit = limit.min(self.config.normal_wip_limit);
        }
        if state.conservative {
            limit = limit.min(self.config.conservative_wip_limit());
        }
        limit
    }

    /// Apply a deferred restore once WIP fits under the normal ceiling.
    fn settle_restore(&self, state: &mut CapacityState) {
        if state.restore_pending && state.current_wip <= self.config.normal_wip_limit {
            state.restore_pending = false;
            state.temporary_active = false;
            info!(limit = self.config.normal_wip_limit, "Normal WIP limit restored");
        }
    }

    fn limits(&self, state: &CapacityState) -> CapacityLimits {
        let limit = self.active_limit(state);
        let admission = self.admission_limit_of(state);
        let c = &state.counters;
        CapacityLimits {
            daily_loc_ok: c.daily_loc <= self.config.daily_loc_limit,
            weekly_loc_ok: c.weekly_loc <= self.config.weekly_loc_limit,
            daily_files_ok: c.daily_files <= self.config.daily_file_limit,
            weekly_files_ok: c.weekly_files <= self.config.weekly_file_limit,
            wip_ok: state.current_wip <= limit,
            can_add_work: state.current_wip < admission,
        }
    }

    fn metrics_of(&self, state: &CapacityState) -> CapacityMetrics {
        let limit = self.active_limit(state);
        CapacityMetrics {
            current_wip: state.current_wip,
            wip_limit: limit,
            admission_limit: self.admission_limit_of(state),
            normal_wip_limit: self.config.normal_wip_limit,
            temporary_wip_limit: self.config.temporary_wip_limit,
            temporary_increase_active: state.temporary_active,
            conservative_mode: state.conservative,
            daily_loc: state.counters.daily_loc,
            weekly_loc: state.counters.weekly_loc,
            daily_files: state.counters.daily_files,
            weekly_files: state.counters.weekly_files,
            avg_completion_hours: state.avg_completion_hours,
            total_completed: state.total_completed,
            utilization: if limit == 0 {
                0.0
            } else {
                state.current_wip as f64 / limit as f64
            },
        }
    }
}

impl Default for CapacityGovernance {
    fn default() -> Self {
        Self::new(CapacityConfig::default())
    }
}

fn roll(counters: &mut ResourceCounters, today: NaiveDate) {
    let (daily, weekly) = counters.roll(today);
    if daily || weekly {
        debug!(daily = daily, weekly = weekly, "Resource counters rolled over");
    }
}

fn queue(state: &CapacityState) -> Vec<QueueEntry> {
    let mut entries: Vec<QueueEntry> = state
        .items
        .values()
        .filter(|i| i.status == WorkStatus::Pending)
        .map(|i| QueueEntry {
            id: i.id.clone(),
            title: i.title.clone(),
            score: state
                .scores
                .get(&i.id)
                .and_then(|s| s.last())
                .map_or(0.0, |s| s.final_score),
        })
        .collect();
    entries.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    entries
}

fn validate_item(item: &WorkItem) -> CapacityResult<()> {
    let invalid = |reason: String| CapacityError::InvalidWorkItem {
        id: item.id.clone(),
        reason,
    };

    if !(1..=10).contains(&item.risk) {
        return Err(invalid(format!("risk {} outside 1..=10", item.risk)));
    }
    if !(1..=10).contains(&item.impact) {
        return Err(invalid(format!("impact {} outside 1..=10", item.impact)));
    }
    if item.estimated_workload > 10 {
        return Err(invalid(format!(
            "estimated workload {} outside 0..=10",
            item.estimated_workload
        )));
    }
    if item.status != WorkStatus::Pending {
        return Err(invalid(format!("new items must be pending, got {}", item.status)));
    }
    Ok(())
}
