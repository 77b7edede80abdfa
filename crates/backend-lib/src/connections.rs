// ============================
// crates/backend-lib/src/connections.rs
// ============================
//! Registry of live viewer subscriptions, per tenant.
//!
//! A subscription is the sending half of a bounded queue drained by the
//! viewer's WebSocket writer task. Dropping it from the registry closes the
//! queue, which in turn ends the connection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use metrics::gauge;
use parking_lot::RwLock;
use rollcall_common::PushMessage;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::meetings::TenantId;
use crate::metrics as keys;
use crate::prune::Expiring;

/// Queue feeding one viewer connection
pub type PushChannel = mpsc::Sender<PushMessage>;

/// Opaque id of a registered subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(Uuid);

impl SubscriptionHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Subscription {
    channel: PushChannel,
    last_keepalive: Instant,
}

/// Copy of a subscription taken for a delivery pass
#[derive(Debug, Clone)]
pub struct LiveSubscription {
    pub handle: SubscriptionHandle,
    pub channel: PushChannel,
    pub last_keepalive: Instant,
}

impl Expiring for LiveSubscription {
    fn last_activity(&self) -> Instant {
        self.last_keepalive
    }
}

#[derive(Default)]
struct TenantSubscriptions {
    subscriptions: HashMap<SubscriptionHandle, Subscription>,
    retired: bool,
}

type Bucket = Arc<RwLock<TenantSubscriptions>>;

/// Live push subscriptions for all tenants
#[derive(Default)]
pub struct ConnectionRegistry {
    tenants: DashMap<TenantId, Bucket>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing(&self, tenant: &str) -> Option<Bucket> {
        self.tenants.get(tenant).map(|entry| Arc::clone(entry.value()))
    }

    fn bucket(&self, tenant: &str) -> Bucket {
        if let Some(bucket) = self.existing(tenant) {
            return bucket;
        }
        Arc::clone(self.tenants.entry(tenant.to_string()).or_default().value())
    }

    /// Add a subscription for `tenant`; its keepalive starts now
    pub fn register(&self, tenant: &str, channel: PushChannel) -> SubscriptionHandle {
        let handle = SubscriptionHandle::new();
        loop {
            let bucket = self.bucket(tenant);
            let mut guard = bucket.write();
            if guard.retired {
                continue;
            }
            guard.subscriptions.insert(
                handle,
                Subscription {
                    channel,
                    last_keepalive: Instant::now(),
                },
            );
            debug!(tenant, %handle, total = guard.subscriptions.len(), "registered subscription");
            break;
        }
        gauge!(keys::WS_ACTIVE).increment(1.0);
        handle
    }

    /// Remove a subscription; unknown handles are ignored
    pub fn unregister(&self, tenant: &str, handle: SubscriptionHandle) -> bool {
        self.prune(tenant, &[handle]) == 1
    }

    /// Remove several subscriptions in one write; returns how many were present
    pub fn prune(&self, tenant: &str, handles: &[SubscriptionHandle]) -> usize {
        if handles.is_empty() {
            return 0;
        }
        let Some(bucket) = self.existing(tenant) else {
            return 0;
        };

        let mut guard = bucket.write();
        if guard.retired {
            return 0;
        }
        let removed = handles
            .iter()
            .filter(|handle| guard.subscriptions.remove(*handle).is_some())
            .count();

        if guard.subscriptions.is_empty() {
            guard.retired = true;
            self.tenants.remove_if(tenant, |_, current| Arc::ptr_eq(current, &bucket));
            debug!(tenant, "removed empty subscription bucket");
        }

        gauge!(keys::WS_ACTIVE).decrement(removed as f64);
        removed
    }

    /// Refresh the keepalive of a subscription after inbound activity
    pub fn touch(&self, tenant: &str, handle: SubscriptionHandle) -> bool {
        let Some(bucket) = self.existing(tenant) else {
            return false;
        };
        let mut guard = bucket.write();
        match guard.subscriptions.get_mut(&handle) {
            Some(subscription) => {
                subscription.last_keepalive = Instant::now();
                true
            },
            None => false,
        }
    }

    /// Point-in-time copy of the tenant's subscriptions
    pub fn live_subscriptions(&self, tenant: &str) -> Vec<LiveSubscription> {
        let Some(bucket) = self.existing(tenant) else {
            return Vec::new();
        };
        let guard = bucket.read();
        guard
            .subscriptions
            .iter()
            .map(|(handle, subscription)| LiveSubscription {
                handle: *handle,
                channel: subscription.channel.clone(),
                last_keepalive: subscription.last_keepalive,
            })
            .collect()
    }

    pub fn subscription_count(&self, tenant: &str) -> usize {
        let Some(bucket) = self.existing(tenant) else {
            return 0;
        };
        let count = bucket.read().subscriptions.len();
        count
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }
}
