//! Host side effects run when a stop executes.

use async_trait::async_trait;

use crate::policy::EmergencyStopRecord;

/// Invoked after a stop policy has been applied.
///
/// An error or panic here forces a hard emergency stop, whatever the policy.
#[async_trait]
pub trait EmergencyStopHook: Send + Sync {
    async fn on_stop(&self, record: &EmergencyStopRecord) -> anyhow::Result<()>;
}

/// Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpStopHook;

#[async_trait]
impl EmergencyStopHook for NoOpStopHook {
    async fn on_stop(&self, _record: &EmergencyStopRecord) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Always fails. Drives the fail-safe path in tests.
#[derive(Debug, Clone)]
pub struct FailingStopHook {
    message: String,
}

impl FailingStopHook {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl EmergencyStopHook for FailingStopHook {
    async fn on_stop(&self, _record: &EmergencyStopRecord) -> anyhow::Result<()> {
        anyhow::bail!("{}", self.message)
    }
}
