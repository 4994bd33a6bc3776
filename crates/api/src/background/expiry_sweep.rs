//! Periodic deletion of expired notifications.
//!
//! Runs once at startup and then on a fixed interval using
//! `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::RunGuard;
use crate::notifications::NotificationService;

/// Run one sweep unless the previous one is still in progress.
///
/// Returns the number of deleted rows, or `None` when the turn was skipped
/// or failed.
pub async fn sweep_once(service: &NotificationService, guard: &RunGuard) -> Option<u64> {
    let Some(_permit) = guard.try_enter() else {
        tracing::debug!("Expiry sweep still running, skipping turn");
        return None;
    };
    match service.sweep_expired(Utc::now()).await {
        Ok(deleted) => {
            if deleted > 0 {
                tracing::info!(deleted, "Expiry sweep: purged expired notifications");
            } else {
                tracing::debug!("Expiry sweep: nothing to purge");
            }
            Some(deleted)
        }
        Err(e) => {
            tracing::error!(error = %e, "Expiry sweep failed");
            None
        }
    }
}

/// Run the expiry sweep loop until `cancel` is triggered.
pub async fn run(service: Arc<NotificationService>, period: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = period.as_secs(), "Expiry sweep job started");

    let guard = RunGuard::new();
    // The first tick completes immediately, which gives the startup sweep.
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Expiry sweep job stopping");
                break;
            }
            _ = interval.tick() => {
                sweep_once(&service, &guard).await;
            }
        }
    }
}
