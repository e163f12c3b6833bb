//! Shared fixtures for the governor end-to-end and property tests.

use std::sync::Arc;

use maple_governor_integration::{GovernorConfig, IntegratedSafetySystem};
use maple_governor_state::StateManager;
use maple_governor_types::WorkItem;
use tracing_subscriber::EnvFilter;

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A booted system with default configuration and its own state manager.
pub async fn booted_system() -> Arc<IntegratedSafetySystem> {
    booted_with(GovernorConfig::default()).await
}

pub async fn booted_with(config: GovernorConfig) -> Arc<IntegratedSafetySystem> {
    init_tracing();
    match IntegratedSafetySystem::start(config, Arc::new(StateManager::new())).await {
        Ok(system) => system,
        Err(e) => panic!("governor failed to start: {}", e),
    }
}

/// A medium-priority work item with the given estimates.
pub fn work_item(id: &str, workload: u8, risk: u8, impact: u8) -> WorkItem {
    WorkItem::new(id, format!("work item {}", id)).with_estimates(workload, risk, impact)
}
