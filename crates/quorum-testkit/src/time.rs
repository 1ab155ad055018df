//! Controllable clock for deterministic expiry tests

use async_trait::async_trait;
use quorum_core::{PhysicalTime, PhysicalTimeEffects, TimeError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Clock whose reading only changes when a test moves it.
///
/// `sleep_ms` still yields to the runtime for the requested duration so loops
/// driven by it make progress, but it never advances the reading.
#[derive(Debug, Default)]
pub struct ControllableClock {
    now_ms: AtomicU64,
    unavailable: AtomicBool,
}

impl ControllableClock {
    /// Create a clock reading `start_ms`
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Set the absolute reading
    pub fn set_ms(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }

    /// Move the reading forward
    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Current reading
    pub fn current_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    /// Make every time call fail with `ServiceUnavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl PhysicalTimeEffects for ControllableClock {
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TimeError::ServiceUnavailable);
        }
        Ok(PhysicalTime::from_ms(self.current_ms()))
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clock_moves_only_when_told() {
        let clock = ControllableClock::new(100);
        assert_eq!(clock.now_ms().await.unwrap(), 100);
        clock.sleep_ms(1).await.unwrap();
        assert_eq!(clock.now_ms().await.unwrap(), 100);

        clock.advance_ms(50);
        assert_eq!(clock.now_ms().await.unwrap(), 150);
        clock.set_ms(10);
        assert_eq!(clock.current_ms(), 10);

        clock.set_unavailable(true);
        assert!(clock.now_ms().await.is_err());
    }
}
