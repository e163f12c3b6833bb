//! Safety score finalization.
//!
//! The raw score is the pass ratio of the last check. It is clamped into the
//! configured band, and an optional drift average drives a two-threshold
//! hysteresis flag ("critical mode"). The drift average is score-like: lower
//! means further from the baseline. Critical mode is entered when it falls to
//! the enter threshold and left only once it climbs back to the higher exit
//! threshold, so a signal hovering at one boundary cannot flap the flag.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Result of finalizing one raw score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalScore {
    pub score: f64,
    pub critical_mode: bool,
    /// Set when this call flipped the critical-mode flag.
    pub mode_changed: bool,
}

/// Clamp band plus critical-mode hysteresis.
#[derive(Debug, Clone)]
pub struct ScoreFinalizer {
    floor: f64,
    ceiling: f64,
    enter_threshold: f64,
    exit_threshold: f64,
    critical_mode: bool,
}

impl ScoreFinalizer {
    pub fn new(floor: f64, ceiling: f64, enter_threshold: f64, exit_threshold: f64) -> Self {
        Self {
            floor,
            ceiling,
            enter_threshold,
            exit_threshold,
            critical_mode: false,
        }
    }

    pub fn critical_mode(&self) -> bool {
        self.critical_mode
    }

    /// Clamp `raw` into the band and update critical mode from `drift_avg`.
    ///
    /// `None` leaves critical mode as it is. Non-finite input is treated as
    /// the band floor.
    pub fn finalize(&mut self, raw: f64, drift_avg: Option<f64>) -> FinalScore {
        let score = if raw.is_finite() {
            raw.clamp(self.floor, self.ceiling)
        } else {
            self.floor
        };

        let before = self.critical_mode;
        if let Some(drift) = drift_avg {
            let drift = if drift.is_finite() { drift } else { 0.0 };
            if !self.critical_mode && drift <= self.enter_threshold {
                self.critical_mode = true;
                warn!(
                    drift = drift,
                    threshold = self.enter_threshold,
                    "Safety critical mode entered"
                );
            } else if self.critical_mode && drift >= self.exit_threshold {
                self.critical_mode = false;
                info!(
                    drift = drift,
                    threshold = self.exit_threshold,
                    "Safety critical mode exited"
                );
            }
        }

        FinalScore {
            score,
            critical_mode: self.critical_mode,
            mode_changed: before != self.critical_mode,
        }
    }

    pub fn reset(&mut self) {
        self.critical_mode = false;
    }
}
