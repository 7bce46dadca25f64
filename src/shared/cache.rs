//! Keyed in-process caches
//!
//! Two shapes are needed by the billing services:
//!
//! - [`ComputeOnceCache`]: atomic compute-if-absent. Concurrent callers for
//!   the same key share one initialisation; a failed initialisation leaves
//!   the slot empty so the next caller retries.
//! - [`ReadOnceMap`]: values that are consumed by the first read.
//!
//! Both support TTL eviction so entries for sessions that never report an
//! end do not accumulate forever.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::OnceCell;

struct Slot<V> {
    cell: OnceCell<V>,
    created_at: Instant,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            created_at: Instant::now(),
        }
    }
}

/// Cache with atomic get-or-compute semantics.
pub struct ComputeOnceCache<K, V> {
    slots: DashMap<K, Arc<Slot<V>>>,
    ttl: Option<Duration>,
}

impl<K, V> ComputeOnceCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            ttl: None,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            ttl: Some(ttl),
        }
    }

    fn slot(&self, key: K) -> Arc<Slot<V>> {
        // The shard guard is released at the end of this statement, before
        // any initialiser runs.
        Arc::clone(&self.slots.entry(key).or_insert_with(|| Arc::new(Slot::new())))
    }

    /// Return the cached value, running `init` only if no value exists yet.
    pub async fn get_or_init<F, Fut>(&self, key: K, init: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let slot = self.slot(key);
        slot.cell.get_or_init(init).await.clone()
    }

    /// Fallible variant of [`get_or_init`](Self::get_or_init). Errors are
    /// not cached.
    pub async fn get_or_try_init<F, Fut, E>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(key);
        slot.cell.get_or_try_init(init).await.cloned()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.slots
            .get(key)
            .and_then(|slot| slot.cell.get().cloned())
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.slots
            .remove(key)
            .and_then(|(_, slot)| slot.cell.get().cloned())
    }

    /// Drop entries older than the configured TTL. Returns the number evicted.
    pub fn evict_expired(&self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.created_at.elapsed() < ttl);
        before - self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<K, V> Default for ComputeOnceCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Map whose values are removed by the first read.
pub struct ReadOnceMap<K, V> {
    entries: DashMap<K, (V, Instant)>,
    ttl: Option<Duration>,
}

impl<K, V> ReadOnceMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            ttl: None,
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Some(ttl),
        }
    }

    /// Insert or overwrite a value, returning the one it replaced.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        self.entries
            .insert(key, (value, Instant::now()))
            .map(|(previous, _)| previous)
    }

    /// Remove and return the value, if present.
    pub fn take(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, (value, _))| value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn evict_expired(&self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let before = self.entries.len();
        self.entries.retain(|_, (_, at)| at.elapsed() < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for ReadOnceMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
