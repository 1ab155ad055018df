//! Periodic expiry sweep
//!
//! Expires overdue sessions and prunes terminal ones past their retention
//! window. The sweep is maintenance only: submissions check expiry on their
//! own, so a late or skipped sweep never lets an overdue session complete.

use crate::manager::SessionManager;
use quorum_core::{PhysicalTimeEffects, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions moved to Expired
    pub expired: usize,
    /// Terminal sessions dropped
    pub pruned: usize,
}

/// Expiry and retention maintenance over a `SessionManager`
pub struct ExpirySweeper {
    manager: Arc<SessionManager>,
    time: Arc<dyn PhysicalTimeEffects>,
    interval_ms: u64,
    retention_ms: u64,
}

impl ExpirySweeper {
    /// Sweeper running every `interval_ms` that keeps terminal sessions for `retention_ms`
    pub fn new(
        manager: Arc<SessionManager>,
        time: Arc<dyn PhysicalTimeEffects>,
        interval_ms: u64,
        retention_ms: u64,
    ) -> Self {
        Self {
            manager,
            time,
            interval_ms: interval_ms.max(1),
            retention_ms,
        }
    }

    /// Run one sweep at the current time
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let now_ms = self.time.now_ms().await?;
        let report = SweepReport {
            expired: self.manager.expiry_sweep(now_ms),
            pruned: self.manager.prune_terminal(now_ms, self.retention_ms),
        };
        debug!(
            now_ms,
            expired = report.expired,
            pruned = report.pruned,
            "Expiry sweep"
        );
        Ok(report)
    }

    /// Sweep every `interval_ms` until `shutdown` flips to true or its
    /// sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = self.sweep_once().await {
                warn!(error = %e, "Expiry sweep failed");
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = self.pause() => {}
            }
        }
        debug!("Expiry sweeper stopped");
    }

    async fn pause(&self) {
        if let Err(e) = self.time.sleep_ms(self.interval_ms).await {
            warn!(error = %e, "Time effect sleep failed; using runtime timer");
            tokio::time::sleep(Duration::from_millis(self.interval_ms)).await;
        }
    }
}
