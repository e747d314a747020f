// crates/schema-registry-client/src/cache.rs
// ============================================================================
// Module: TTL LRU Cache
// Description: Bounded map with least-recently-used eviction and optional expiry.
// Purpose: Cache "latest version" lookups that may change on the registry.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`TtlLruCache`] keeps at most `capacity` entries. Each read refreshes the
//! entry's recency, so every access takes the inner mutex. Recency is a
//! monotonically increasing tick; a `BTreeMap` from tick to key yields the
//! least recently used entry in `O(log n)`.
//! Invariants:
//! - `recency` and `entries` always hold the same key set.
//! - Entries older than the TTL are never returned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Cached value with bookkeeping.
struct CacheEntry<V> {
    /// Cached value.
    value: V,
    /// Insertion time used for expiry.
    inserted_at: Instant,
    /// Recency tick of the last access.
    tick: u64,
}

/// Mutable cache state guarded by the mutex.
struct CacheState<K, V> {
    /// Entries by key.
    entries: HashMap<K, CacheEntry<V>>,
    /// Keys ordered by last access tick.
    recency: BTreeMap<u64, K>,
    /// Next recency tick.
    next_tick: u64,
}

impl<K: Eq + Hash + Clone, V> CacheState<K, V> {
    /// Allocates the next recency tick.
    fn tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick = self.next_tick.wrapping_add(1);
        tick
    }

    /// Removes an entry and its recency slot.
    fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.tick);
        Some(entry)
    }

    /// Evicts the least recently used entry.
    fn evict_lru(&mut self) {
        if let Some((_, key)) = self.recency.pop_first() {
            self.entries.remove(&key);
        }
    }
}

/// Thread-safe LRU cache with optional time-to-live.
///
/// # Invariants
/// - Holds at most `capacity` entries; a capacity of zero stores nothing.
/// - `ttl == None` disables expiry.
pub struct TtlLruCache<K, V> {
    /// Maximum number of entries.
    capacity: usize,
    /// Entry lifetime.
    ttl: Option<Duration>,
    /// Guarded state.
    state: Mutex<CacheState<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlLruCache<K, V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            capacity,
            ttl,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                next_tick: 0,
            }),
        }
    }

    /// Returns the configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the configured time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns a fresh value and marks it most recently used.
    ///
    /// Expired entries are purged and reported as absent.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.lock();
        let expired = match state.entries.get(key) {
            None => return None,
            Some(entry) => self.is_expired(entry.inserted_at),
        };
        if expired {
            state.remove(key);
            return None;
        }
        let tick = state.tick();
        let entry = state.entries.get_mut(key)?;
        let previous = std::mem::replace(&mut entry.tick, tick);
        let value = entry.value.clone();
        state.recency.remove(&previous);
        state.recency.insert(tick, key.clone());
        Some(value)
    }

    /// Inserts or replaces a value, evicting the least recently used entry on overflow.
    pub fn put(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.lock();
        state.remove(&key);
        while state.entries.len() >= self.capacity {
            state.evict_lru();
        }
        let tick = state.tick();
        state.recency.insert(tick, key.clone());
        state.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                tick,
            },
        );
    }

    /// Removes a value, returning it when present.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().remove(key).map(|entry| entry.value)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.recency.clear();
    }

    /// Returns the number of stored entries, including not-yet-purged expired ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true when no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true when an entry inserted at `inserted_at` has outlived the TTL.
    fn is_expired(&self, inserted_at: Instant) -> bool {
        self.ttl.is_some_and(|ttl| inserted_at.elapsed() > ttl)
    }

    /// Locks the state.
    ///
    /// No caller code runs under the lock, so a poisoned guard still holds a
    /// consistent map and is reused.
    fn lock(&self) -> MutexGuard<'_, CacheState<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> std::fmt::Debug for TtlLruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlLruCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
