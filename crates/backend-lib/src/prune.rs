// ============================
// crates/backend-lib/src/prune.rs
// ============================
//! Deadline-based garbage collection.
//!
//! Meetings and viewer subscriptions both expire after a period without
//! activity. Both implement [`Expiring`] and are collected with the helpers
//! below: the meeting sweep periodically, the broadcaster opportunistically.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Something that goes stale when it has seen no activity for a while
pub trait Expiring {
    /// Monotonic time of the last observed activity
    fn last_activity(&self) -> Instant;

    /// True once more than `window` has passed since the last activity
    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.last_activity()) > window
    }
}

/// Remove every expired entry from `entries` and return the removed keys
pub fn drain_expired<K, V>(entries: &mut HashMap<K, V>, now: Instant, window: Duration) -> Vec<K>
where
    K: Eq + Hash + Clone,
    V: Expiring,
{
    let expired: Vec<K> = entries
        .iter()
        .filter(|(_, entry)| entry.is_expired(now, window))
        .map(|(key, _)| key.clone())
        .collect();

    for key in &expired {
        entries.remove(key);
    }

    expired
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stamp(Instant);

    impl Expiring for Stamp {
        fn last_activity(&self) -> Instant {
            self.0
        }
    }

    #[test]
    fn test_is_expired_is_strict() {
        let start = Instant::now();
        let stamp = Stamp(start);
        let window = Duration::from_secs(60);

        assert!(!stamp.is_expired(start + window, window));
        assert!(stamp.is_expired(start + window + Duration::from_millis(1), window));
    }

    #[test]
    fn test_activity_in_the_future_is_not_expired() {
        let now = Instant::now();
        let stamp = Stamp(now + Duration::from_secs(5));
        assert!(!stamp.is_expired(now, Duration::ZERO));
    }

    #[test]
    fn test_drain_expired_keeps_fresh_entries() {
        let start = Instant::now();
        let mut entries = HashMap::new();
        entries.insert("old", Stamp(start));
        entries.insert("fresh", Stamp(start + Duration::from_secs(100)));

        let removed = drain_expired(&mut entries, start + Duration::from_secs(101), Duration::from_secs(10));

        assert_eq!(removed, vec!["old"]);
        assert!(entries.contains_key("fresh"));
        assert_eq!(entries.len(), 1);
    }
}
