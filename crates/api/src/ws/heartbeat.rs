use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::background::RunGuard;
use crate::ws::manager::{Gateway, LivenessOutcome};

/// Periodic liveness sweep over the gateway's sessions.
pub struct LivenessMonitor {
    gateway: Arc<Gateway>,
    guard: RunGuard,
}

impl LivenessMonitor {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            guard: RunGuard::new(),
        }
    }

    /// Run one sweep, or return `None` if the previous one has not finished.
    pub async fn run_once(&self) -> Option<LivenessOutcome> {
        let Some(_permit) = self.guard.try_enter() else {
            tracing::debug!("Liveness sweep still running, skipping turn");
            return None;
        };
        let outcome = self.gateway.liveness_sweep().await;
        tracing::debug!(
            probed = outcome.probed,
            evicted = outcome.evicted,
            "WebSocket liveness sweep"
        );
        Some(outcome)
    }

    /// Sweep every `period` until `cancel` is triggered.
    pub async fn run(self, period: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Liveness sweep stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.run_once().await;
                }
            }
        }
    }
}

/// Spawn the liveness sweep as a background task.
pub fn start_heartbeat(
    gateway: Arc<Gateway>,
    period: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tracing::info!(interval_secs = period.as_secs(), "WebSocket heartbeat started");
    tokio::spawn(LivenessMonitor::new(gateway).run(period, cancel))
}
