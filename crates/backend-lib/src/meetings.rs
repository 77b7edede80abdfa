// ============================
// crates/backend-lib/src/meetings.rs
// ============================
//! In-memory meeting state, sharded by tenant.
//!
//! Every tenant owns one [`RwLock`] guarding its meeting set. The outer
//! [`DashMap`] is only used to find (or atomically create) that lock, so a
//! slow operation on one tenant never blocks another tenant.
//!
//! A tenant scope whose meeting set becomes empty during a sweep is retired
//! and removed from the map. Writers that raced with the removal notice the
//! `retired` flag once they get the lock and retry against a fresh scope.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metrics::{counter, gauge};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::metrics as keys;
use crate::prune::{drain_expired, Expiring};

pub type TenantId = String;
pub type MeetingId = String;

/// Display name used when the provider sends an empty one
pub const ANONYMOUS: &str = "Anonymous";

/// A single meeting occurrence
#[derive(Debug, Clone)]
pub struct Meeting {
    pub topic: String,
    /// participant key -> display name
    roster: HashMap<String, String>,
    last_activity: Instant,
    last_updated: DateTime<Utc>,
}

impl Meeting {
    fn new(topic: &str, now: Instant) -> Self {
        Self {
            topic: topic.to_string(),
            roster: HashMap::new(),
            last_activity: now,
            last_updated: Utc::now(),
        }
    }

    fn touch(&mut self, now: Instant) {
        self.last_activity = now;
        self.last_updated = Utc::now();
    }

    /// Display names in ascending order
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.roster.values().cloned().collect();
        names.sort();
        names
    }

    pub fn participant_count(&self) -> usize {
        self.roster.len()
    }
}

impl Expiring for Meeting {
    fn last_activity(&self) -> Instant {
        self.last_activity
    }
}

/// Point-in-time view of a tenant's most recently active meeting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetingSnapshot {
    pub meeting_id: MeetingId,
    pub topic: String,
    /// Sorted display names
    pub participants: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl MeetingSnapshot {
    fn of(meeting_id: &str, meeting: &Meeting) -> Self {
        Self {
            meeting_id: meeting_id.to_string(),
            topic: meeting.topic.clone(),
            participants: meeting.sorted_names(),
            last_updated: meeting.last_updated,
        }
    }
}

/// Result of a join or a successful leave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterChange {
    /// Name that was added or removed
    pub display_name: String,
    /// Another meeting was the tenant's latest before this mutation
    pub switched_meeting: bool,
    /// The participant key was already on the roster
    pub rejoined: bool,
}

#[derive(Debug, Default)]
struct TenantMeetings {
    meetings: HashMap<MeetingId, Meeting>,
    retired: bool,
}

type Scope = Arc<RwLock<TenantMeetings>>;

fn latest(meetings: &HashMap<MeetingId, Meeting>) -> Option<(&MeetingId, &Meeting)> {
    meetings.iter().max_by_key(|(_, meeting)| meeting.last_activity)
}

/// One tenant's meetings, borrowed under the tenant's write lock
pub struct TenantView<'a> {
    tenant: &'a str,
    meetings: &'a mut HashMap<MeetingId, Meeting>,
}

impl TenantView<'_> {
    pub fn join(&mut self, meeting_id: &str, participant_key: &str, display_name: &str, topic: &str) -> RosterChange {
        self.join_at(meeting_id, participant_key, display_name, topic, Instant::now())
    }

    fn join_at(
        &mut self,
        meeting_id: &str,
        participant_key: &str,
        display_name: &str,
        topic: &str,
        now: Instant,
    ) -> RosterChange {
        let display_name = if display_name.is_empty() { ANONYMOUS } else { display_name };
        let switched_meeting = latest(self.meetings).is_some_and(|(id, _)| id != meeting_id);

        let tenant = self.tenant;
        let meeting = self.meetings.entry(meeting_id.to_string()).or_insert_with(|| {
            debug!(tenant, meeting_id, "tracking new meeting");
            Meeting::new(topic, now)
        });
        let previous = meeting.roster.insert(participant_key.to_string(), display_name.to_string());
        meeting.touch(now);

        RosterChange {
            display_name: display_name.to_string(),
            switched_meeting,
            rejoined: previous.is_some(),
        }
    }

    pub fn leave(&mut self, meeting_id: &str, participant_key: &str) -> Option<RosterChange> {
        self.leave_at(meeting_id, participant_key, Instant::now())
    }

    fn leave_at(&mut self, meeting_id: &str, participant_key: &str, now: Instant) -> Option<RosterChange> {
        let switched_meeting = latest(self.meetings).is_some_and(|(id, _)| id != meeting_id);

        let meeting = self.meetings.get_mut(meeting_id)?;
        let display_name = meeting.roster.remove(participant_key)?;
        meeting.touch(now);

        Some(RosterChange {
            display_name,
            switched_meeting,
            rejoined: false,
        })
    }

    pub fn end(&mut self, meeting_id: &str) -> bool {
        self.end_at(meeting_id, Instant::now())
    }

    fn end_at(&mut self, meeting_id: &str, now: Instant) -> bool {
        match self.meetings.get_mut(meeting_id) {
            Some(meeting) => {
                meeting.roster.clear();
                meeting.touch(now);
                true
            },
            None => false,
        }
    }

    pub fn latest_snapshot(&self) -> Option<MeetingSnapshot> {
        latest(self.meetings).map(|(id, meeting)| MeetingSnapshot::of(id, meeting))
    }
}

/// Authoritative store of live meetings for all tenants
#[derive(Default)]
pub struct MeetingStore {
    tenants: DashMap<TenantId, Scope>,
}

impl MeetingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the tenant's scope if it does not exist yet.
    ///
    /// Returns `true` for the single caller that created it.
    pub fn ensure_tenant(&self, tenant: &str) -> bool {
        if self.tenants.contains_key(tenant) {
            return false;
        }
        match self.tenants.entry(tenant.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(Scope::default());
                info!(tenant, "initialized tenant meeting scope");
                true
            },
        }
    }

    fn scope(&self, tenant: &str) -> Scope {
        if let Some(existing) = self.tenants.get(tenant) {
            return Arc::clone(existing.value());
        }
        // the shard guard is dropped at the end of this statement
        Arc::clone(self.tenants.entry(tenant.to_string()).or_default().value())
    }

    fn write_tenant<R>(&self, tenant: &str, f: impl FnOnce(&mut TenantView<'_>) -> R) -> R {
        loop {
            let scope = self.scope(tenant);
            let mut guard = scope.write();
            if guard.retired {
                continue;
            }
            let mut view = TenantView {
                tenant,
                meetings: &mut guard.meetings,
            };
            return f(&mut view);
        }
    }

    /// Run `f` against the tenant's meetings while holding its write lock.
    ///
    /// Every mutation and whatever `f` does after it form one critical
    /// section, so two calls for the same tenant never interleave and a
    /// concurrent [`MeetingStore::with_latest_snapshot`] observes either
    /// none or all of it.
    pub fn with_tenant_mut<R>(&self, tenant: &str, f: impl FnOnce(&mut TenantView<'_>) -> R) -> R {
        self.write_tenant(tenant, f)
    }

    /// Record a participant joining `meeting_id`, creating the meeting if needed.
    ///
    /// Returns the display name actually stored.
    pub fn apply_join(
        &self,
        tenant: &str,
        meeting_id: &str,
        participant_key: &str,
        display_name: &str,
        topic: &str,
    ) -> RosterChange {
        self.apply_join_at(tenant, meeting_id, participant_key, display_name, topic, Instant::now())
    }

    pub(crate) fn apply_join_at(
        &self,
        tenant: &str,
        meeting_id: &str,
        participant_key: &str,
        display_name: &str,
        topic: &str,
        now: Instant,
    ) -> RosterChange {
        self.write_tenant(tenant, |view| {
            view.join_at(meeting_id, participant_key, display_name, topic, now)
        })
    }

    /// Remove a participant. Unknown meetings or participants are ignored.
    pub fn apply_leave(&self, tenant: &str, meeting_id: &str, participant_key: &str) -> Option<RosterChange> {
        self.apply_leave_at(tenant, meeting_id, participant_key, Instant::now())
    }

    pub(crate) fn apply_leave_at(
        &self,
        tenant: &str,
        meeting_id: &str,
        participant_key: &str,
        now: Instant,
    ) -> Option<RosterChange> {
        self.write_tenant(tenant, |view| view.leave_at(meeting_id, participant_key, now))
    }

    /// Clear the roster but keep the meeting record.
    ///
    /// Returns `false` if the meeting is unknown.
    pub fn apply_meeting_ended(&self, tenant: &str, meeting_id: &str) -> bool {
        self.write_tenant(tenant, |view| view.end_at(meeting_id, Instant::now()))
    }

    /// The tenant's meeting with the most recent activity
    pub fn snapshot_latest_meeting(&self, tenant: &str) -> Option<MeetingSnapshot> {
        let scope = Arc::clone(self.tenants.get(tenant)?.value());
        let guard = scope.read();
        if guard.retired {
            return None;
        }
        latest(&guard.meetings).map(|(id, meeting)| MeetingSnapshot::of(id, meeting))
    }

    /// Run `f` with the latest snapshot while holding the tenant's read lock.
    ///
    /// No mutation for the tenant can complete while `f` runs, which lets a
    /// caller register a subscription without missing a concurrent change.
    pub fn with_latest_snapshot<R>(&self, tenant: &str, f: impl FnOnce(Option<MeetingSnapshot>) -> R) -> R {
        loop {
            let scope = self.scope(tenant);
            let guard = scope.read();
            if guard.retired {
                continue;
            }
            let snapshot = latest(&guard.meetings).map(|(id, meeting)| MeetingSnapshot::of(id, meeting));
            return f(snapshot);
        }
    }

    /// Evict meetings idle for longer than `retention`; returns their ids
    pub fn sweep_expired(&self, retention: Duration) -> Vec<MeetingId> {
        self.sweep_expired_at(Instant::now(), retention)
    }

    pub fn sweep_expired_at(&self, now: Instant, retention: Duration) -> Vec<MeetingId> {
        let scopes: Vec<(TenantId, Scope)> = self
            .tenants
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut removed = Vec::new();
        for (tenant, scope) in scopes {
            let mut guard = scope.write();
            if guard.retired {
                continue;
            }

            let expired = drain_expired(&mut guard.meetings, now, retention);
            for meeting_id in &expired {
                info!(tenant = %tenant, meeting_id = %meeting_id, "cleaned up old meeting");
            }
            counter!(keys::MEETINGS_SWEPT).increment(expired.len() as u64);
            removed.extend(expired);

            if guard.meetings.is_empty() {
                guard.retired = true;
                self.tenants.remove_if(&tenant, |_, current| Arc::ptr_eq(current, &scope));
                info!(tenant = %tenant, "removed empty tenant meeting scope");
            }
        }

        gauge!(keys::TENANTS_ACTIVE).set(self.tenants.len() as f64);
        removed
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }

    pub fn meeting_count(&self, tenant: &str) -> usize {
        let Some(scope) = self.tenants.get(tenant).map(|entry| Arc::clone(entry.value())) else {
            return 0;
        };
        let count = scope.read().meetings.len();
        count
    }
}
