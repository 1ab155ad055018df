//! Physical time effect
//!
//! Wall-clock access is injected so expiry and sweeping are deterministic in
//! tests. Production uses `quorum_effects::RealTimeHandler`; tests use the
//! testkit's controllable clock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error type for time operations.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum TimeError {
    /// The clock could not be read
    #[error("Time service unavailable")]
    ServiceUnavailable,
    /// The clock or sleep call failed
    #[error("Operation failed: {reason}")]
    OperationFailed {
        /// Failure description
        reason: String,
    },
}

/// Wall-clock reading in Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhysicalTime {
    /// Milliseconds since the Unix epoch
    pub ts_ms: u64,
}

impl PhysicalTime {
    /// Wrap a Unix millisecond timestamp
    pub fn from_ms(ts_ms: u64) -> Self {
        Self { ts_ms }
    }
}

/// Wall-clock access
#[async_trait]
pub trait PhysicalTimeEffects: Send + Sync {
    /// Current wall-clock time
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError>;
    /// Suspend for `ms` milliseconds
    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError>;

    /// Current Unix timestamp in milliseconds.
    async fn now_ms(&self) -> Result<u64, TimeError> {
        self.physical_time().await.map(|t| t.ts_ms)
    }
}
