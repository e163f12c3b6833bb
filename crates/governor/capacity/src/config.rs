//! Capacity quotas.

use serde::{Deserialize, Serialize};

use crate::error::{CapacityError, CapacityResult};

/// Capacity governance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    /// WIP ceiling in normal operation.
    pub normal_wip_limit: u32,

    /// WIP ceiling while a temporary increase is active.
    pub temporary_wip_limit: u32,

    pub daily_loc_limit: u64,
    pub weekly_loc_limit: u64,
    pub daily_file_limit: u64,
    pub weekly_file_limit: u64,

    /// Smoothing factor of the completion-time moving average.
    pub completion_ema_alpha: f64,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            normal_wip_limit: 2,
            temporary_wip_limit: 3,
            daily_loc_limit: 1000,
            weekly_loc_limit: 5000,
            daily_file_limit: 25,
            weekly_file_limit: 100,
            completion_ema_alpha: 0.1,
        }
    }
}

impl CapacityConfig {
    pub fn validate(&self) -> CapacityResult<()> {
        if self.normal_wip_limit == 0 {
            return Err(CapacityError::InvalidConfig(
                "normal WIP limit must be greater than zero".into(),
            ));
        }
        if self.temporary_wip_limit < self.normal_wip_limit {
            return Err(CapacityError::InvalidConfig(format!(
                "temporary WIP limit {} is below normal limit {}",
                self.temporary_wip_limit, self.normal_wip_limit
            )));
        }
        if !(self.completion_ema_alpha > 0.0 && self.completion_ema_alpha <= 1.0) {
            return Err(CapacityError::InvalidConfig(format!(
                "completion EMA alpha {} must lie in (0, 1]",
                self.completion_ema_alpha
            )));
        }
        Ok(())
    }

    /// Ceiling used by the conservative fallback.
    pub fn conservative_wip_limit(&self) -> u32 {
        self.normal_wip_limit.saturating_sub(1).max(1)
    }
}
