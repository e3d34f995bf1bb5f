//! HashMap-backed store implementations.
//!
//! ## Architecture
//! - Keys are stored in a `HashMap<K, Arc<V>>` for O(1) lookup.
//! - Capacity is enforced by entry count; a full store rejects new keys
//!   with [`StoreFull`] instead of evicting.
//! - `ConcurrentHashMapStore` uses one `RwLock`, `ShardedHashMapStore` one
//!   `RwLock` per shard.
//!
//! ## Core Operations
//! - `try_insert`: insert or overwrite by key (`Replaced` notification).
//! - `insert_if_absent`: insert without ever overwriting (no notification).
//! - `get`: fetch by key (updates hit/miss metrics).
//! - `remove` / `clear`: delete entries (`Explicit` notification).
//!
//! ## Example Usage
//! ```rust
//! use std::sync::Arc;
//!
//! use loadkit::store::hashmap::ConcurrentHashMapStore;
//! use loadkit::store::traits::{ConcurrentStore, StoreCore};
//!
//! let store: ConcurrentHashMapStore<u64, String> = ConcurrentHashMapStore::new(2);
//! store.try_insert(1, Arc::new("a".to_string())).unwrap();
//! let kept = store.insert_if_absent(1, Arc::new("b".to_string())).unwrap();
//! assert_eq!(*kept, "a");
//! assert!(store.contains(&1));
//! ```
//!
//! ## Thread Safety
//! - Both stores are `Send + Sync`.
//! - Removal listeners run after the lock protecting the entry is released,
//!   so a listener may call back into the store.
use std::collections::HashMap;
use std::collections::hash_map::{Entry, RandomState};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::listener::{NoopListener, RemovalCause, RemovalListener};
use crate::store::traits::{ConcurrentStore, StoreCore, StoreFull, StoreMetrics};

/// Store metrics counters for concurrent hash map stores.
#[derive(Debug, Default)]
struct ConcurrentStoreCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    removes: AtomicU64,
}

impl ConcurrentStoreCounters {
    /// Snapshot current store metrics.
    fn snapshot(&self) -> StoreMetrics {
        StoreMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
        }
    }

    fn inc_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_removes(&self, count: u64) {
        self.removes.fetch_add(count, Ordering::Relaxed);
    }

    fn record_lookup<V>(&self, found: Option<V>) -> Option<V> {
        match found {
            Some(value) => {
                self.inc_hit();
                Some(value)
            },
            None => {
                self.inc_miss();
                None
            },
        }
    }
}

// ---------------------------------------------------------------------------
// ConcurrentHashMapStore
// ---------------------------------------------------------------------------

/// Concurrent HashMap-backed store using a single `RwLock`.
pub struct ConcurrentHashMapStore<K, V, S = RandomState> {
    map: RwLock<HashMap<K, Arc<V>, S>>,
    capacity: usize,
    metrics: ConcurrentStoreCounters,
    listener: Arc<dyn RemovalListener<K, V>>,
}

impl<K, V> ConcurrentHashMapStore<K, V, RandomState>
where
    K: Eq + Hash + Send,
{
    /// Create a concurrent store with the default hasher and no listener.
    pub fn new(capacity: usize) -> Self {
        Self::with_hasher(capacity, RandomState::new())
    }
}

impl<K, V, S> ConcurrentHashMapStore<K, V, S>
where
    K: Eq + Hash + Send,
    S: BuildHasher,
{
    /// Create a concurrent store with a custom hasher.
    pub fn with_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            map: RwLock::new(HashMap::with_hasher(hasher)),
            capacity,
            metrics: ConcurrentStoreCounters::default(),
            listener: Arc::new(NoopListener),
        }
    }

    /// Replace the removal listener.
    pub fn with_listener(mut self, listener: Arc<dyn RemovalListener<K, V>>) -> Self {
        self.listener = listener;
        self
    }
}

impl<K, V, S> fmt::Debug for ConcurrentHashMapStore<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentHashMapStore")
            .field("len", &self.map.read().len())
            .field("capacity", &self.capacity)
            .field("listener", &self.listener)
            .finish()
    }
}

impl<K, V, S> StoreCore<K, V> for ConcurrentHashMapStore<K, V, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
{
    /// Fetch a value by key.
    fn get(&self, key: &K) -> Option<Arc<V>> {
        let found = self.map.read().get(key).cloned();
        self.metrics.record_lookup(found)
    }

    fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.map.read().get(key).cloned()
    }

    /// Check whether a key exists.
    fn contains(&self, key: &K) -> bool {
        self.map.read().contains_key(key)
    }

    /// Return the number of entries.
    fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Return the maximum capacity.
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn keys(&self) -> Vec<K> {
        self.map.read().keys().cloned().collect()
    }

    fn entries(&self) -> Vec<(K, Arc<V>)> {
        self.map
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Snapshot store metrics.
    fn metrics(&self) -> StoreMetrics {
        self.metrics.snapshot()
    }
}

impl<K, V, S> ConcurrentStore<K, V> for ConcurrentHashMapStore<K, V, S>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
    S: BuildHasher + Send + Sync,
{
    /// Insert or update an entry.
    fn try_insert(&self, key: K, value: Arc<V>) -> Result<Option<Arc<V>>, StoreFull> {
        let mut map = self.map.write();
        if !map.contains_key(&key) && map.len() >= self.capacity {
            return Err(StoreFull);
        }
        let notify_key = key.clone();
        let previous = map.insert(key, value);
        drop(map);

        match &previous {
            Some(old) => {
                self.metrics.inc_update();
                self.listener
                    .on_removal(&notify_key, old, RemovalCause::Replaced);
            },
            None => self.metrics.inc_insert(),
        }
        Ok(previous)
    }

    fn insert_if_absent(&self, key: K, value: Arc<V>) -> Result<Arc<V>, StoreFull> {
        let mut map = self.map.write();
        let len = map.len();
        match map.entry(key) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                if len >= self.capacity {
                    return Err(StoreFull);
                }
                entry.insert(value.clone());
                self.metrics.inc_insert();
                Ok(value)
            },
        }
    }

    /// Remove a value by key.
    fn remove(&self, key: &K) -> Option<Arc<V>> {
        let removed = self.map.write().remove(key);
        if let Some(old) = &removed {
            self.metrics.inc_removes(1);
            self.listener.on_removal(key, old, RemovalCause::Explicit);
        }
        removed
    }

    /// Clear all entries.
    fn clear(&self) {
        let drained: Vec<(K, Arc<V>)> = self.map.write().drain().collect();
        self.metrics.inc_removes(drained.len() as u64);
        for (key, value) in &drained {
            self.listener.on_removal(key, value, RemovalCause::Explicit);
        }
    }
}

// ---------------------------------------------------------------------------
// ShardedHashMapStore
// ---------------------------------------------------------------------------

/// Concurrent HashMap-backed store with sharded locking.
pub struct ShardedHashMapStore<K, V, S = RandomState> {
    shards: Vec<RwLock<HashMap<K, Arc<V>, S>>>,
    capacity: usize,
    size: AtomicUsize,
    metrics: ConcurrentStoreCounters,
    hasher: S,
    listener: Arc<dyn RemovalListener<K, V>>,
}

impl<K, V> ShardedHashMapStore<K, V, RandomState>
where
    K: Eq + Hash + Send + Sync,
{
    /// Create a sharded store with the default hasher.
    pub fn new(capacity: usize, shards: usize) -> Self {
        Self::with_hasher(capacity, shards, RandomState::new())
    }
}

impl<K, V, S> ShardedHashMapStore<K, V, S>
where
    K: Eq + Hash + Send + Sync,
    S: BuildHasher + Clone,
{
    /// Create a sharded store with a custom hasher.
    pub fn with_hasher(capacity: usize, shards: usize, hasher: S) -> Self {
        let shard_count = shards.max(1);
        let shards = (0..shard_count)
            .map(|_| RwLock::new(HashMap::with_hasher(hasher.clone())))
            .collect();
        Self {
            shards,
            capacity,
            size: AtomicUsize::new(0),
            metrics: ConcurrentStoreCounters::default(),
            hasher,
            listener: Arc::new(NoopListener),
        }
    }

    /// Replace the removal listener.
    pub fn with_listener(mut self, listener: Arc<dyn RemovalListener<K, V>>) -> Self {
        self.listener = listener;
        self
    }

    /// Return the number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Compute the shard index for a key.
    fn shard_index(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) as usize) % self.shards.len()
    }

    /// Reserve one slot of global capacity.
    fn reserve_slot(&self) -> Result<(), StoreFull> {
        let mut current = self.size.load(Ordering::Relaxed);
        loop {
            if current >= self.capacity {
                return Err(StoreFull);
            }
            match self.size.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }
}

impl<K, V, S> fmt::Debug for ShardedHashMapStore<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedHashMapStore")
            .field("shards", &self.shards.len())
            .field("len", &self.size.load(Ordering::Relaxed))
            .field("capacity", &self.capacity)
            .field("listener", &self.listener)
            .finish()
    }
}

impl<K, V, S> StoreCore<K, V> for ShardedHashMapStore<K, V, S>
where
    K: Eq + Hash + Clone + Send + Sync,
    S: BuildHasher + Clone,
{
    /// Fetch a value by key.
    fn get(&self, key: &K) -> Option<Arc<V>> {
        let idx = self.shard_index(key);
        let found = self.shards[idx].read().get(key).cloned();
        self.metrics.record_lookup(found)
    }

    fn peek(&self, key: &K) -> Option<Arc<V>> {
        let idx = self.shard_index(key);
        self.shards[idx].read().get(key).cloned()
    }

    /// Check whether a key exists.
    fn contains(&self, key: &K) -> bool {
        let idx = self.shard_index(key);
        self.shards[idx].read().contains_key(key)
    }

    /// Return the number of entries.
    fn len(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Return the maximum capacity.
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.len());
        for shard in &self.shards {
            keys.extend(shard.read().keys().cloned());
        }
        keys
    }

    fn entries(&self) -> Vec<(K, Arc<V>)> {
        let mut entries = Vec::with_capacity(self.len());
        for shard in &self.shards {
            entries.extend(shard.read().iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        entries
    }

    /// Snapshot store metrics.
    fn metrics(&self) -> StoreMetrics {
        self.metrics.snapshot()
    }
}

impl<K, V, S> ConcurrentStore<K, V> for ShardedHashMapStore<K, V, S>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
    S: BuildHasher + Clone + Send + Sync,
{
    /// Insert or update an entry.
    fn try_insert(&self, key: K, value: Arc<V>) -> Result<Option<Arc<V>>, StoreFull> {
        let idx = self.shard_index(&key);
        let mut map = self.shards[idx].write();
        match map.entry(key) {
            Entry::Occupied(mut entry) => {
                let notify_key = entry.key().clone();
                let previous = entry.insert(value);
                drop(map);
                self.metrics.inc_update();
                self.listener
                    .on_removal(&notify_key, &previous, RemovalCause::Replaced);
                Ok(Some(previous))
            },
            Entry::Vacant(entry) => {
                self.reserve_slot()?;
                entry.insert(value);
                self.metrics.inc_insert();
                Ok(None)
            },
        }
    }

    fn insert_if_absent(&self, key: K, value: Arc<V>) -> Result<Arc<V>, StoreFull> {
        let idx = self.shard_index(&key);
        let mut map = self.shards[idx].write();
        match map.entry(key) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                self.reserve_slot()?;
                entry.insert(value.clone());
                self.metrics.inc_insert();
                Ok(value)
            },
        }
    }

    /// Remove a value by key.
    fn remove(&self, key: &K) -> Option<Arc<V>> {
        let idx = self.shard_index(key);
        let removed = self.shards[idx].write().remove(key);
        if let Some(old) = &removed {
            self.size.fetch_sub(1, Ordering::Relaxed);
            self.metrics.inc_removes(1);
            self.listener.on_removal(key, old, RemovalCause::Explicit);
        }
        removed
    }

    /// Clear all entries.
    fn clear(&self) {
        let mut drained = Vec::new();
        for shard in &self.shards {
            let mut guard = shard.write();
            let before = drained.len();
            drained.extend(guard.drain());
            self.size
                .fetch_sub(drained.len() - before, Ordering::Relaxed);
        }
        self.metrics.inc_removes(drained.len() as u64);
        for (key, value) in &drained {
            self.listener.on_removal(key, value, RemovalCause::Explicit);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::listener::{RejectingListener, listener_fn};

    type Events = Arc<Mutex<Vec<(&'static str, String, RemovalCause)>>>;

    fn recording() -> (Events, Arc<dyn RemovalListener<&'static str, String>>) {
        let events: Events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let listener = listener_fn(move |k: &&'static str, v: &Arc<String>, cause| {
            sink.lock().unwrap().push((*k, (**v).clone(), cause));
        });
        (events, listener)
    }

    #[test]
    fn concurrent_store_basic_ops() {
        let store = ConcurrentHashMapStore::new(2);
        let value = Arc::new("v1".to_string());
        assert_eq!(store.try_insert("k1", value.clone()), Ok(None));
        assert_eq!(store.get(&"k1"), Some(value.clone()));
        assert!(store.contains(&"k1"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.capacity(), 2);
        assert_eq!(store.keys(), vec!["k1"]);
        assert_eq!(store.remove(&"k1"), Some(value));
        assert!(!store.contains(&"k1"));
    }

    #[test]
    fn concurrent_store_capacity_enforced() {
        let store = ConcurrentHashMapStore::new(1);
        assert_eq!(store.try_insert("k1", Arc::new("v1".to_string())), Ok(None));
        assert_eq!(
            store.try_insert("k2", Arc::new("v2".to_string())),
            Err(StoreFull)
        );
        assert_eq!(
            store.insert_if_absent("k2", Arc::new("v2".to_string())),
            Err(StoreFull)
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn insert_if_absent_keeps_existing_value() {
        let store = ConcurrentHashMapStore::<&str, String>::new(4)
            .with_listener(Arc::new(RejectingListener));
        let first = store
            .insert_if_absent("k1", Arc::new("first".to_string()))
            .unwrap();
        let second = store
            .insert_if_absent("k1", Arc::new("second".to_string()))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*store.get(&"k1").unwrap(), "first");
    }

    #[test]
    fn listener_sees_replace_remove_and_clear() {
        let (events, listener) = recording();
        let store = ConcurrentHashMapStore::new(4).with_listener(listener);
        store.try_insert("a", Arc::new("1".to_string())).unwrap();
        store.try_insert("a", Arc::new("2".to_string())).unwrap();
        store.try_insert("b", Arc::new("3".to_string())).unwrap();
        store.remove(&"a");
        store.clear();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], ("a", "1".to_string(), RemovalCause::Replaced));
        assert_eq!(events[1], ("a", "2".to_string(), RemovalCause::Explicit));
        assert_eq!(events[2], ("b", "3".to_string(), RemovalCause::Explicit));
    }

    #[test]
    fn sharded_store_basic_ops() {
        let store = ShardedHashMapStore::new(2, 2);
        let value = Arc::new("v1".to_string());
        assert_eq!(store.try_insert("k1", value.clone()), Ok(None));
        assert_eq!(store.get(&"k1"), Some(value.clone()));
        assert!(store.contains(&"k1"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.capacity(), 2);
        assert_eq!(store.entries(), vec![("k1", value.clone())]);
        assert_eq!(store.remove(&"k1"), Some(value));
        assert!(!store.contains(&"k1"));
    }

    #[test]
    fn sharded_store_capacity_enforced() {
        let store = ShardedHashMapStore::new(1, 2);
        assert_eq!(store.try_insert("k1", Arc::new("v1".to_string())), Ok(None));
        assert_eq!(
            store.try_insert("k2", Arc::new("v2".to_string())),
            Err(StoreFull)
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sharded_clear_resets_size_and_notifies() {
        let (events, listener) = recording();
        let store = ShardedHashMapStore::new(8, 4).with_listener(listener);
        for key in ["a", "b", "c"] {
            store.insert_if_absent(key, Arc::new(key.to_string())).unwrap();
        }
        assert_eq!(store.len(), 3);
        store.clear();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
        assert_eq!(events.lock().unwrap().len(), 3);
    }

    #[test]
    fn store_metrics_counts() {
        let store = ConcurrentHashMapStore::new(2);
        let value = Arc::new("v1".to_string());

        assert_eq!(store.metrics(), StoreMetrics::default());
        assert_eq!(store.get(&"missing"), None);
        assert_eq!(store.try_insert("k1", value.clone()), Ok(None));
        assert_eq!(
            store.try_insert("k1", value.clone()),
            Ok(Some(value.clone()))
        );
        assert_eq!(store.get(&"k1"), Some(value.clone()));
        assert_eq!(store.remove(&"k1"), Some(value));

        let metrics = store.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.inserts, 1);
        assert_eq!(metrics.updates, 1);
        assert_eq!(metrics.removes, 1);
    }

    #[test]
    fn peek_leaves_lookup_metrics_alone() {
        let concurrent = ConcurrentHashMapStore::new(2);
        concurrent.try_insert("k1", Arc::new("v1".to_string())).unwrap();
        let sharded = ShardedHashMapStore::new(2, 2);
        sharded.try_insert("k1", Arc::new("v1".to_string())).unwrap();

        let stores: [&dyn ConcurrentStore<&str, String>; 2] = [&concurrent, &sharded];
        for store in stores {
            let before = store.metrics();
            assert_eq!(store.peek(&"k1").as_deref().map(String::as_str), Some("v1"));
            assert_eq!(store.peek(&"missing"), None);
            let after = store.metrics();
            assert_eq!((after.hits, after.misses), (before.hits, before.misses));
        }
    }
}
