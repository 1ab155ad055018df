//! Wall-clock time handler

use async_trait::async_trait;
use quorum_core::{PhysicalTime, PhysicalTimeEffects, TimeError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Real time handler for production use
///
/// Delegates to the operating system clock and Tokio's timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeHandler;

impl RealTimeHandler {
    /// Create a new real time handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PhysicalTimeEffects for RealTimeHandler {
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError> {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TimeError::OperationFailed {
                reason: format!("system clock before Unix epoch: {e}"),
            })?;
        let ts_ms = u64::try_from(elapsed.as_millis()).map_err(|_| TimeError::OperationFailed {
            reason: "timestamp overflow".to_string(),
        })?;
        Ok(PhysicalTime { ts_ms })
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }
}
