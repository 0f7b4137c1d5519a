// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounded TTL store for short-lived pending state (e.g. password resets).
//!
//! Passed by reference to whoever needs it; there is no process-wide
//! instance.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// In-process LRU map whose entries expire after a fixed TTL.
pub struct PendingStore<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> PendingStore<K, V> {
    /// - `capacity`: max number of live entries; the least recently used
    ///   entry is evicted beyond it.
    /// - `ttl`: lifetime of each entry.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or replace the entry for `key`.
    pub fn put(&self, key: K, value: V) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                key,
                Entry {
                    value,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// Current value for `key`, if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        if let Some(entry) = entries.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
            entries.pop(key);
        }
        None
    }

    /// Remove and return the entry for `key` if it is live and `accept`
    /// holds for it. A rejected entry stays in place; an expired one is
    /// dropped.
    pub fn take_if(&self, key: &K, accept: impl FnOnce(&V) -> bool) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        let entry = entries.peek(key)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            entries.pop(key);
            return None;
        }
        if !accept(&entry.value) {
            return None;
        }
        entries.pop(key).map(|entry| entry.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get() {
        let store = PendingStore::new(10, Duration::from_secs(300));
        assert!(store.get(&"a").is_none());

        store.put("a", 1);
        assert_eq!(store.get(&"a"), Some(1));
    }

    #[test]
    fn take_if_is_single_use() {
        let store = PendingStore::new(10, Duration::from_secs(300));
        store.put("a", 1);

        assert_eq!(store.take_if(&"a", |_| true), Some(1));
        assert_eq!(store.take_if(&"a", |_| true), None);
    }

    #[test]
    fn rejected_take_keeps_entry() {
        let store = PendingStore::new(10, Duration::from_secs(300));
        store.put("a", 2);

        assert_eq!(store.take_if(&"a", |v| *v == 1), None);
        assert_eq!(store.get(&"a"), Some(2));
    }

    #[test]
    fn entries_expire() {
        let store = PendingStore::new(10, Duration::from_millis(1));
        store.put("a", 1);

        std::thread::sleep(Duration::from_millis(5));

        assert!(store.get(&"a").is_none());
        assert!(store.take_if(&"a", |_| true).is_none());
    }

    #[test]
    fn capacity_evicts_least_recent() {
        let store = PendingStore::new(2, Duration::from_secs(300));
        store.put("a", 1);
        store.put("b", 2);
        store.put("c", 3);

        assert!(store.get(&"a").is_none());
        assert_eq!(store.get(&"c"), Some(3));
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let store = PendingStore::new(0, Duration::from_secs(300));
        store.put("a", 1);
        assert_eq!(store.get(&"a"), Some(1));
    }
}
