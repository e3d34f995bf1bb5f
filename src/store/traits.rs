//! Storage backends for loading caches.
//!
//! Stores own key/value entries and their lookup semantics; the loading
//! cache only coordinates who computes a missing value. The cache treats the
//! store as the single source of truth for presence and never assumes a
//! particular table layout or eviction strategy behind these traits.
//!
//! Stores are responsible for calling their
//! [`RemovalListener`](crate::listener::RemovalListener) when an entry is
//! removed or overwritten.

use std::sync::Arc;

/// Snapshot of store-level metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreMetrics {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub updates: u64,
    pub removes: u64,
}

/// Error returned when a store is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreFull;

/// Read-side store operations.
pub trait StoreCore<K, V> {
    /// Fetch a value by key.
    fn get(&self, key: &K) -> Option<Arc<V>>;

    /// Fetch a value without counting the lookup in [`StoreMetrics`].
    fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.get(key)
    }

    /// Check if a key exists.
    fn contains(&self, key: &K) -> bool;

    /// Current number of entries.
    fn len(&self) -> usize;

    /// Check if the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum entries the store accepts.
    fn capacity(&self) -> usize;

    /// Clone out the keys currently stored.
    fn keys(&self) -> Vec<K>;

    /// Clone out the entries currently stored.
    fn entries(&self) -> Vec<(K, Arc<V>)>;

    /// Snapshot the store's current metrics.
    fn metrics(&self) -> StoreMetrics {
        StoreMetrics::default()
    }
}

/// Mutable store operations for concurrent backends (interior mutability).
pub trait ConcurrentStore<K, V>: StoreCore<K, V> + Send + Sync {
    /// Insert or update a value. Returns the previous value if present.
    /// Returns `StoreFull` if at capacity and inserting a new key.
    ///
    /// Overwriting notifies the removal listener with `Replaced`.
    fn try_insert(&self, key: K, value: Arc<V>) -> Result<Option<Arc<V>>, StoreFull>;

    /// Insert a value only if the key is absent.
    ///
    /// Returns the value stored under `key` afterwards: the existing one if
    /// the key was present, otherwise `value`. Never notifies the removal
    /// listener.
    fn insert_if_absent(&self, key: K, value: Arc<V>) -> Result<Arc<V>, StoreFull>;

    /// Remove a value by key.
    fn remove(&self, key: &K) -> Option<Arc<V>>;

    /// Remove all entries.
    fn clear(&self);
}
