// ============================
// crates/backend-lib/src/broadcast.rs
// ============================
//! Fan-out of roster changes to live viewer subscriptions.
//!
//! A delivery pass works on a point-in-time copy of the tenant's
//! subscriptions, so no registry lock is held while messages are queued.
//! Subscriptions that are stale, closed or too slow to keep up are collected
//! during the pass and removed afterwards in a single registry write.
//! Store locks are always taken before registry locks, never the reverse.
//! Delivery is never retried: a viewer that misses a message reconnects and
//! receives a fresh snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::counter;
use rollcall_common::PushMessage;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::connections::{ConnectionRegistry, SubscriptionHandle};
use crate::events::{ChangeDescription, EventProcessor, WebhookEvent};
use crate::meetings::{MeetingSnapshot, MeetingStore};
use crate::metrics as keys;
use crate::prune::Expiring;

/// Outcome of one delivery pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub pruned: usize,
}

/// Full-list message for `snapshot`; no meeting means an empty list
pub fn reset_message(snapshot: Option<&MeetingSnapshot>) -> PushMessage {
    PushMessage::Reset {
        participants: snapshot.map(|s| s.participants.clone()).unwrap_or_default(),
    }
}

#[derive(Clone)]
pub struct Broadcaster {
    store: Arc<MeetingStore>,
    connections: Arc<ConnectionRegistry>,
    liveness_window: Duration,
    queue_capacity: usize,
}

impl Broadcaster {
    pub fn new(
        store: Arc<MeetingStore>,
        connections: Arc<ConnectionRegistry>,
        liveness_window: Duration,
        queue_capacity: usize,
    ) -> Self {
        Self {
            store,
            connections,
            liveness_window,
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new viewer for `tenant`.
    ///
    /// The returned queue already holds the Reset snapshot, so it is always
    /// the first message the viewer sees. The snapshot is taken under the
    /// tenant's read lock and registration happens before the lock is
    /// released. Changes published through [`Broadcaster::apply_event`] hold
    /// the write lock until delivered, so each one is either already part of
    /// the snapshot or queued after it, never both.
    pub fn subscribe(&self, tenant: &str) -> (SubscriptionHandle, mpsc::Receiver<PushMessage>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let handle = self.store.with_latest_snapshot(tenant, |snapshot| {
            // a fresh queue always has room for one message
            let _ = tx.try_send(reset_message(snapshot.as_ref()));
            self.connections.register(tenant, tx)
        });
        (handle, rx)
    }

    /// Apply `event` and queue its effect for every viewer of `tenant` in
    /// one critical section.
    ///
    /// Viewers receive changes in the order they were applied.
    pub fn apply_event(
        &self,
        processor: &EventProcessor,
        tenant: &str,
        event: &WebhookEvent,
    ) -> (ChangeDescription, DeliveryReport) {
        processor.process_then(tenant, event, |change, view| {
            self.publish(tenant, change, || view.latest_snapshot())
        })
    }

    /// Push the viewer-visible effect of an already applied `change`.
    ///
    /// Not ordered against concurrent mutations; webhook traffic goes
    /// through [`Broadcaster::apply_event`].
    pub fn broadcast_change(&self, tenant: &str, change: &ChangeDescription) -> DeliveryReport {
        self.publish(tenant, change, || self.store.snapshot_latest_meeting(tenant))
    }

    fn publish(
        &self,
        tenant: &str,
        change: &ChangeDescription,
        snapshot: impl FnOnce() -> Option<MeetingSnapshot>,
    ) -> DeliveryReport {
        match change {
            ChangeDescription::NoOp => DeliveryReport::default(),
            ChangeDescription::Joined { name } => self.deliver(tenant, &PushMessage::Add { name: name.clone() }),
            ChangeDescription::Left { name } => self.deliver(tenant, &PushMessage::Remove { name: name.clone() }),
            ChangeDescription::Reset => self.broadcast_snapshot(tenant, snapshot().as_ref()),
        }
    }

    /// Push the complete sorted list to every viewer of `tenant`
    pub fn broadcast_snapshot(&self, tenant: &str, snapshot: Option<&MeetingSnapshot>) -> DeliveryReport {
        self.deliver(tenant, &reset_message(snapshot))
    }

    pub fn deliver(&self, tenant: &str, message: &PushMessage) -> DeliveryReport {
        self.deliver_at(tenant, message, Instant::now())
    }

    /// One delivery pass with an explicit clock
    pub fn deliver_at(&self, tenant: &str, message: &PushMessage, now: Instant) -> DeliveryReport {
        let subscriptions = self.connections.live_subscriptions(tenant);
        if subscriptions.is_empty() {
            return DeliveryReport::default();
        }

        let mut dead = Vec::new();
        let mut delivered = 0;
        for subscription in subscriptions {
            if subscription.is_expired(now, self.liveness_window) {
                debug!(tenant, handle = %subscription.handle, "subscription missed its keepalive");
                dead.push(subscription.handle);
                continue;
            }

            match subscription.channel.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(tenant, handle = %subscription.handle, "subscriber is not keeping up, dropping it");
                    dead.push(subscription.handle);
                },
                Err(TrySendError::Closed(_)) => {
                    debug!(tenant, handle = %subscription.handle, "subscriber went away");
                    dead.push(subscription.handle);
                },
            }
        }

        let pruned = self.connections.prune(tenant, &dead);
        counter!(keys::PUSH_DELIVERED).increment(delivered as u64);
        counter!(keys::SUBSCRIPTIONS_PRUNED).increment(pruned as u64);

        DeliveryReport { delivered, pruned }
    }
}
