//! Per-trigger hysteresis windows and warmup cooldowns.
//!
//! Instants come from `tokio::time`, so tests can drive the windows with a
//! paused clock.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use maple_governor_types::StopTrigger;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::HysteresisConfig;

#[derive(Debug, Default)]
struct Window {
    violations: VecDeque<Instant>,
    last_stop: Option<Instant>,
}

/// Snapshot of one trigger's window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerWindowStatus {
    pub trigger: StopTrigger,
    pub violations_in_span: usize,
    pub window_size: usize,
    pub satisfied: bool,
    pub warmup_remaining: Option<Duration>,
}

/// Hysteresis state for every trigger.
#[derive(Debug)]
pub struct HysteresisTracker {
    config: HysteresisConfig,
    windows: BTreeMap<StopTrigger, Window>,
}

impl HysteresisTracker {
    pub fn new(config: HysteresisConfig) -> Self {
        Self {
            config,
            windows: BTreeMap::new(),
        }
    }

    /// Record a violation and return how many fall inside the span.
    pub fn record_violation(&mut self, trigger: StopTrigger, now: Instant) -> usize {
        let span = self.config.time_span();
        let window = self.windows.entry(trigger).or_default();
        window.violations.push_back(now);
        prune(window, now, span);
        window.violations.len()
    }

    /// N violations inside the span.
    pub fn is_satisfied(&self, trigger: StopTrigger, now: Instant) -> bool {
        self.violations_in_span(trigger, now) >= self.config.window_size
    }

    pub fn violations_in_span(&self, trigger: StopTrigger, now: Instant) -> usize {
        let span = self.config.time_span();
        self.windows.get(&trigger).map_or(0, |w| {
            w.violations
                .iter()
                .filter(|t| now.saturating_duration_since(**t) <= span)
                .count()
        })
    }

    /// Time left in the trigger's post-stop warmup, if any.
    pub fn warmup_remaining(&self, trigger: StopTrigger, now: Instant) -> Option<Duration> {
        let warmup = self.config.warmup();
        let last = self.windows.get(&trigger)?.last_stop?;
        let elapsed = now.saturating_duration_since(last);
        (elapsed < warmup).then(|| warmup - elapsed)
    }

    pub fn any_warmup_active(&self, now: Instant) -> bool {
        StopTrigger::ALL
            .iter()
            .any(|t| self.warmup_remaining(*t, now).is_some())
    }

    /// Start the trigger's warmup and clear its window.
    pub fn mark_stopped(&mut self, trigger: StopTrigger, now: Instant) {
        let window = self.windows.entry(trigger).or_default();
        window.violations.clear();
        window.last_stop = Some(now);
    }

    pub fn window_size(&self) -> usize {
        self.config.window_size
    }

    pub fn status(&self, now: Instant) -> Vec<TriggerWindowStatus> {
        StopTrigger::ALL
            .iter()
            .map(|t| {
                let violations_in_span = self.violations_in_span(*t, now);
                TriggerWindowStatus {
                    trigger: *t,
                    violations_in_span,
                    window_size: self.config.window_size,
                    satisfied: violations_in_span >= self.config.window_size,
                    warmup_remaining: self.warmup_remaining(*t, now),
                }
            })
            .collect()
    }
}

fn prune(window: &mut Window, now: Instant, span: Duration) {
    while let Some(front) = window.violations.front() {
        if now.saturating_duration_since(*front) > span {
            window.violations.pop_front();
        } else {
            break;
        }
    }
}
