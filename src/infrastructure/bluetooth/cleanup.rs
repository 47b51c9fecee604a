//! Global Cleanup Scheduler
//!
//! Periodically evicts dice that stayed disconnected for too long.

use crate::infrastructure::bluetooth::service::ConnectionManager;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Running sweep task. Dropping it stops the sweeps.
pub struct CleanupScheduler {
    task: JoinHandle<()>,
}

impl CleanupScheduler {
    /// Sweep every `cleanup_interval` configured on the manager
    pub fn start(manager: ConnectionManager) -> Self {
        let interval = manager.settings().cleanup_interval();
        Self::with_interval(manager, interval)
    }

    pub fn with_interval(manager: ConnectionManager, interval: Duration) -> Self {
        info!(interval_ms = interval.as_millis() as u64, "Starting die cleanup");
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = manager.sweep_stale().await;
                if evicted > 0 {
                    info!(evicted, "Removed stale dice");
                } else {
                    debug!("Cleanup sweep found nothing to remove");
                }
            }
        });
        Self { task }
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}
