//! Short-lived conversation snapshots keyed by lead.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::models::message::Message;

struct CacheEntry {
    messages: Vec<Message>,
    captured_at: Instant,
}

/// In-memory map from conversation key to the last loaded messages.
///
/// Entries are valid while `now - captured_at < ttl`. Stale entries are
/// evicted lazily when read.
pub struct MessageCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl MessageCache {
    /// Create an empty cache with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Return a copy of the fresh snapshot for `key`, if any.
    pub fn get(&mut self, key: &str) -> Option<Vec<Message>> {
        let fresh = self
            .entries
            .get(key)
            .map(|entry| entry.captured_at.elapsed() < self.ttl)?;

        if fresh {
            self.entries.get(key).map(|entry| entry.messages.clone())
        } else {
            self.entries.remove(key);
            None
        }
    }

    /// Store a snapshot captured now, replacing any previous one.
    pub fn insert(&mut self, key: &str, messages: Vec<Message>) {
        self.entries.insert(
            key.to_owned(),
            CacheEntry {
                messages,
                captured_at: Instant::now(),
            },
        );
    }

    /// Evict one key. Returns whether an entry existed.
    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Evict every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries held, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
