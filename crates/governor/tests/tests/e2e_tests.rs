#[path = "e2e/work_lifecycle.rs"]
mod work_lifecycle;

#[path = "e2e/stop_policies.rs"]
mod stop_policies;

#[path = "e2e/recovery.rs"]
mod recovery;

#[path = "e2e/heartbeat.rs"]
mod heartbeat;

#[path = "e2e/state_sync.rs"]
mod state_sync;
