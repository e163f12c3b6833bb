//! Governor configuration.
//!
//! Every section has safe defaults and `#[serde(default)]`, so a partial
//! TOML file only overrides what it names.

use std::path::Path;
use std::time::Duration;

use maple_governor_capacity::CapacityConfig;
use maple_governor_equivalence::EquivalenceConfig;
use maple_governor_safety::SafetyConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{IntegrationError, IntegrationResult};

/// Hysteresis window applied per stop trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HysteresisConfig {
    /// Violations needed within the span before a stop fires.
    pub window_size: usize,

    /// Span the violations must fall in, in seconds.
    pub time_span_secs: u64,

    /// Cooldown after a stop before the same trigger can fire again, in
    /// seconds.
    pub warmup_secs: u64,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            window_size: 3,
            time_span_secs: 180,
            warmup_secs: 60,
        }
    }
}

impl HysteresisConfig {
    pub fn time_span(&self) -> Duration {
        Duration::from_secs(self.time_span_secs)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }
}

/// Emergency-stop policy resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StopPolicyConfig {
    /// Window in which a repeat of an executed stop is suppressed, in seconds.
    pub dedupe_window_secs: u64,

    /// Severity difference under which two stops count as repeats.
    pub severity_tolerance: f64,

    /// Equivalence violations at or above this severity stop immediately.
    pub equivalence_immediate_severity: f64,

    /// Performance violations at or above this severity stop immediately.
    pub performance_immediate_severity: f64,

    /// Severity reported for capacity violations.
    pub capacity_violation_severity: f64,

    /// Stop records kept in history.
    pub history_limit: usize,
}

impl Default for StopPolicyConfig {
    fn default() -> Self {
        Self {
            dedupe_window_secs: 300,
            severity_tolerance: 0.1,
            equivalence_immediate_severity: 0.9,
            performance_immediate_severity: 0.8,
            capacity_violation_severity: 0.7,
            history_limit: 500,
        }
    }
}

impl StopPolicyConfig {
    pub fn dedupe_window(&self) -> Duration {
        Duration::from_secs(self.dedupe_window_secs)
    }
}

/// Full governor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    pub capacity: CapacityConfig,
    pub safety: SafetyConfig,
    pub equivalence: EquivalenceConfig,
    pub hysteresis: HysteresisConfig,
    pub stop_policy: StopPolicyConfig,
    pub boot: BootConfig,
}

/// Boot and recovery timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Bound on boot and on readiness waits, in seconds.
    pub ready_timeout_secs: u64,

    /// Attempts to confirm the state manager after recovery.
    pub recovery_retries: u32,

    /// Pause between recovery confirmation attempts, in milliseconds.
    pub recovery_retry_pause_ms: u64,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            ready_timeout_secs: 30,
            recovery_retries: 3,
            recovery_retry_pause_ms: 100,
        }
    }
}

impl BootConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn recovery_retry_pause(&self) -> Duration {
        Duration::from_millis(self.recovery_retry_pause_ms)
    }
}

impl GovernorConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing path, or a path that does not exist, yields the defaults.
    pub fn load(path: Option<&Path>) -> IntegrationResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration text.
    pub fn from_toml_str(contents: &str) -> IntegrationResult<Self> {
        let config: GovernorConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IntegrationResult<()> {
        let invalid = |msg: String| Err(IntegrationError::Configuration(msg));

        self.capacity
            .validate()
            .map_err(|e| IntegrationError::Configuration(e.to_string()))?;
        self.safety
            .validate()
            .map_err(|e| IntegrationError::Configuration(e.to_string()))?;
        self.equivalence
            .validate()
            .map_err(|e| IntegrationError::Configuration(e.to_string()))?;

        if self.hysteresis.window_size == 0 {
            return invalid("hysteresis window size must be greater than zero".into());
        }
        if self.hysteresis.time_span_secs == 0 {
            return invalid("hysteresis time span must be greater than zero".into());
        }

        let sp = &self.stop_policy;
        for (name, value) in [
            ("severity_tolerance", sp.severity_tolerance),
            ("equivalence_immediate_severity", sp.equivalence_immediate_severity),
            ("performance_immediate_severity", sp.performance_immediate_severity),
            ("capacity_violation_severity", sp.capacity_violation_severity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{} {} must lie within [0, 1]", name, value));
            }
        }
        if sp.history_limit == 0 {
            return invalid("stop history limit must be greater than zero".into());
        }
        if self.boot.ready_timeout_secs == 0 {
            return invalid("ready timeout must be greater than zero".into());
        }

        Ok(())
    }
}
