//! Periodic availability monitoring
//!
//! A background task re-probes every backend on a fixed interval and
//! announces each availability flip. The task holds only a weak reference
//! to the orchestrator and exits once it is stopped or the orchestrator is
//! dropped.

use crate::orchestrator::Orchestrator;
use llmrelay_core::{AvailabilityChange, AvailabilitySnapshot};
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Backends whose availability differs between two snapshots
pub fn diff_snapshots(
    previous: &AvailabilitySnapshot,
    current: &AvailabilitySnapshot,
) -> Vec<AvailabilityChange> {
    current
        .iter()
        .filter(|(backend, available)| previous.is_available(*backend) != *available)
        .map(|(backend, now_available)| AvailabilityChange {
            backend,
            now_available,
        })
        .collect()
}

/// Handle to a running monitor loop
pub(crate) struct MonitorTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MonitorTask {
    pub(crate) fn spawn(orchestrator: Weak<Orchestrator>, interval: Duration) -> Self {
        let (stop, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }

                let Some(orchestrator) = orchestrator.upgrade() else {
                    break;
                };
                let changes = orchestrator.run_monitor_cycle(&stop_rx).await;
                debug!(changes = changes.len(), "Monitor cycle complete");
            }
            debug!("Monitor loop exited");
        });

        Self { stop, handle }
    }

    /// Signal the loop to exit; a probe already in flight is discarded
    pub(crate) fn stop(self) {
        // Receiver is gone once the loop has exited
        let _ = self.stop.send(true);
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
