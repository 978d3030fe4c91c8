//! A capacity-bounded, TTL-expiring cache keyed by an arbitrary hashable key.
//!
//! Backs the Access Store's per-user `AccessSet` cache and the Schema Factory's per-user
//! projected-schema cache (§4.B, §4.E): both are "resolve once, cache by a stable ID,
//! evict the coldest entry past capacity or past its TTL" caches, so this is written once
//! and generic rather than duplicated per caller.
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    last_used: u64,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    clock: u64,
}

/// An LRU cache with a per-entry time-to-live.
///
/// Eviction happens lazily on `get`/`insert` rather than via a background sweep: a stale
/// entry is treated as a miss and removed the next time anything touches the cache.
pub struct LruTtlCache<K, V> {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> LruTtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Function: `pub fn new`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        LruTtlCache {
            capacity: capacity.max(1),
            ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                clock: 0,
            }),
        }
    }

    /// Look up `key`, returning `None` on a miss or an expired entry (which is evicted).
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let expired = match inner.entries.get(key) {
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            inner.entries.remove(key);
            return None;
        }
        inner.clock += 1;
        let clock = inner.clock;
        let entry = inner.entries.get_mut(key).expect("checked above");
        entry.last_used = clock;
        Some(entry.value.clone())
    }

    /// Insert or replace `key`, evicting the least-recently-used entry if this insert
    /// would exceed capacity.
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let clock = inner.clock;

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            if let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone())
            {
                inner.entries.remove(&oldest);
            }
        }

        inner.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
                last_used: clock,
            },
        );
    }

    /// Remove `key` unconditionally, e.g. when its content hash is known to have changed.
    pub fn remove(&self, key: &K) {
        self.inner.lock().entries.remove(key);
    }

    /// Method: `pub fn len`.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Method: `pub fn is_empty`.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
