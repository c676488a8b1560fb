//! Background removal of expired records.
//!
//! Reads already refuse expired messages; the sweeper only reclaims space
//! for messages nobody came back for.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use dadpass_messages::MessageStore;

/// Spawn a task that purges expired records every `every` until `shutdown`
/// flips to `true` or its sender is dropped.
pub fn spawn_sweeper(
    messages: Arc<MessageStore>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        info!(interval = ?every, backend = messages.backend(), "Expiry sweeper started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match messages.purge_expired().await {
                        Ok(purged) => debug!(purged, "Sweep finished"),
                        Err(e) => warn!(error = %e, "Sweep failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Expiry sweeper stopped");
    })
}
