// ============================
// crates/backend-lib/src/sweep.rs
// ============================
//! Periodic removal of idle meetings.
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::meetings::MeetingStore;

/// Sweep `store` every `interval`, dropping meetings idle for longer than
/// `retention`. The first pass runs one interval after start; the task runs
/// until aborted or the runtime shuts down.
pub fn spawn_sweeper(store: Arc<MeetingStore>, interval: Duration, retention: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(?interval, ?retention, "meeting sweeper started");

        loop {
            ticker.tick().await;
            let removed = store.sweep_expired(retention);
            debug!(removed = removed.len(), tenants = store.tenant_count(), "sweep pass finished");
        }
    })
}
