// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-bounded caches: event deduplication, echo suppression, and the
//! remote-id to room-event correlation used by deletions.
//!
//! All three are `moka` caches. Eviction is purely time-to-live; capacity is
//! only an upper bound on memory.

use std::time::Duration;

use moka::sync::Cache;
use sha2::{Digest, Sha256};
use talkrelay_core::{EventId, RemoteId};

/// Remembers event ids seen within the deduplication window.
#[derive(Clone)]
pub struct DedupCache {
    seen: Cache<EventId, ()>,
}

impl DedupCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            seen: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Records `event_id` on first sight and returns false; returns true on
    /// every later call inside the window. Check and insert are one atomic step.
    pub fn is_duplicate(&self, event_id: &EventId) -> bool {
        !self.seen.entry(event_id.clone()).or_insert(()).is_fresh()
    }
}

/// Short-lived record of bodies the relay expects to see come back from the room.
#[derive(Clone)]
pub struct EchoCache {
    own_user_id: String,
    bodies: Cache<String, ()>,
}

impl EchoCache {
    pub fn new(own_user_id: impl Into<String>, capacity: u64, ttl: Duration) -> Self {
        Self {
            own_user_id: own_user_id.into(),
            bodies: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// True when the relay's own identity posted a body recorded within the window.
    ///
    /// Other senders never produce echoes and leave the cache untouched.
    pub fn is_echo(&self, sender_id: &str, body: &str) -> bool {
        sender_id == self.own_user_id && self.bodies.contains_key(&content_key(body))
    }

    pub fn record_echo_candidate(&self, body: &str) {
        self.bodies.insert(content_key(body), ());
    }
}

fn content_key(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

/// Maps delivered remote messages to the room events they became.
#[derive(Clone)]
pub struct CorrelationStore {
    events: Cache<RemoteId, EventId>,
}

impl CorrelationStore {
    pub const TTL: Duration = Duration::from_secs(24 * 60 * 60);

    pub fn new(capacity: u64) -> Self {
        Self::with_ttl(capacity, Self::TTL)
    }

    pub fn with_ttl(capacity: u64, ttl: Duration) -> Self {
        Self {
            events: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn insert(&self, remote_id: RemoteId, event_id: EventId) {
        self.events.insert(remote_id, event_id);
    }

    pub fn get(&self, remote_id: &RemoteId) -> Option<EventId> {
        self.events.get(remote_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "@relay:example.org";

    #[test]
    fn duplicate_check_is_false_then_true() {
        let cache = DedupCache::new(100, Duration::from_secs(600));
        let id = EventId::from("$one");
        assert!(!cache.is_duplicate(&id));
        assert!(cache.is_duplicate(&id));
        assert!(cache.is_duplicate(&id));
        assert!(!cache.is_duplicate(&EventId::from("$two")));
    }

    #[test]
    fn duplicate_window_expires() {
        let cache = DedupCache::new(100, Duration::from_millis(50));
        let id = EventId::from("$one");
        assert!(!cache.is_duplicate(&id));
        std::thread::sleep(Duration::from_millis(120));
        assert!(!cache.is_duplicate(&id));
    }

    #[test]
    fn own_body_is_echo_only_after_recording() {
        let cache = EchoCache::new(BOT, 100, Duration::from_secs(5));
        assert!(!cache.is_echo(BOT, "hello"));
        cache.record_echo_candidate("hello");
        assert!(cache.is_echo(BOT, "hello"));
        assert!(!cache.is_echo(BOT, "hello again"));
    }

    #[test]
    fn foreign_bodies_are_not_candidates() {
        let cache = EchoCache::new(BOT, 100, Duration::from_secs(5));
        assert!(!cache.is_echo("@alice:example.org", "!off"));
        assert!(!cache.is_echo(BOT, "!off"));

        cache.record_echo_candidate("relayed");
        assert!(!cache.is_echo("@alice:example.org", "relayed"));
    }

    #[test]
    fn echo_window_expires() {
        let cache = EchoCache::new(BOT, 100, Duration::from_millis(50));
        cache.record_echo_candidate("ping");
        assert!(cache.is_echo(BOT, "ping"));
        std::thread::sleep(Duration::from_millis(120));
        assert!(!cache.is_echo(BOT, "ping"));
    }

    #[test]
    fn correlation_round_trip() {
        let store = CorrelationStore::new(10);
        store.insert(RemoteId::from("r1"), EventId::from("$e1"));
        assert_eq!(store.get(&RemoteId::from("r1")), Some(EventId::from("$e1")));
        assert_eq!(store.get(&RemoteId::from("r2")), None);
    }
}
