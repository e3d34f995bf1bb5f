//! The loading cache façade.
//!
//! [`LoadingCache`] is what callers hold. Reads go through the
//! [`LoadCoordinator`], which loads absent keys at most once at a time;
//! explicit writes and invalidations go straight to the store.
//!
//! ## Operations
//!
//! | Operation            | Loads? | Stats                                  |
//! |----------------------|--------|----------------------------------------|
//! | `get`                | yes    | one hit or one miss                    |
//! | `get_all`            | yes    | one hit or miss per distinct key       |
//! | `get_if_present`     | no     | one hit or one miss                    |
//! | `refresh`            | always | load outcome only                      |
//! | `put` / `invalidate` | no     | none                                   |
//!
//! Loads additionally record one success or one failure per loader
//! invocation; a bulk call counts once.
//!
//! ## Example Usage
//!
//! ```
//! use loadkit::builder::CacheBuilder;
//! use loadkit::loader::loader_fn;
//!
//! let cache = CacheBuilder::new(128).build(loader_fn(|k: &u64| Ok(format!("user-{k}"))));
//!
//! assert_eq!(cache.get(&7).unwrap().as_deref().map(String::as_str), Some("user-7"));
//! assert_eq!(cache.get_if_present(&7).as_deref().map(String::as_str), Some("user-7"));
//!
//! let all = cache.get_all([7, 8, 7]).unwrap();
//! assert_eq!(all.len(), 2);
//!
//! let stats = cache.stats();
//! assert_eq!(stats.hit_count, 2);
//! assert_eq!(stats.miss_count, 2);
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::coordinator::LoadCoordinator;
use crate::error::CacheError;
use crate::result::BulkResult;
use crate::stats::{CacheStats, StatsCounter};
use crate::store::traits::{ConcurrentStore, StoreCore};

/// A thread-safe cache that computes absent values with a loader.
///
/// Share it between threads behind an `Arc`. Every method takes `&self`.
pub struct LoadingCache<K, V> {
    coordinator: LoadCoordinator<K, V>,
    stats: Arc<dyn StatsCounter>,
}

impl<K, V> fmt::Debug for LoadingCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingCache")
            .field("coordinator", &self.coordinator)
            .field("stats", &self.stats)
            .finish()
    }
}

impl<K, V> LoadingCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn new(coordinator: LoadCoordinator<K, V>, stats: Arc<dyn StatsCounter>) -> Self {
        Self { coordinator, stats }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Returns the value for `key`, loading it if absent.
    ///
    /// `Ok(None)` means the loader reported no value; nothing is cached for
    /// the key. Concurrent callers for the same absent key share one load
    /// and its outcome, failure included.
    pub fn get(&self, key: &K) -> Result<Option<Arc<V>>, CacheError> {
        self.coordinator.get(key)
    }

    /// Like [`get`](Self::get) for callers whose key may be missing.
    ///
    /// A `None` key is rejected with [`CacheError::InvalidArgument`] without
    /// touching the store, the loader, or the stats.
    pub fn get_checked(&self, key: Option<&K>) -> Result<Option<Arc<V>>, CacheError> {
        let key = key.ok_or(CacheError::InvalidArgument("key must not be null"))?;
        self.get(key)
    }

    /// Returns values for every key in `keys`, loading the absent ones.
    ///
    /// Duplicate keys are resolved once. Keys the loader reports as not found
    /// are left out of the result. If any load fails the whole call fails,
    /// after every load it started has been stored or published.
    pub fn get_all<I>(&self, keys: I) -> Result<BulkResult<K, V>, CacheError>
    where
        I: IntoIterator<Item = K>,
    {
        let keys = distinct(keys);
        if keys.is_empty() {
            return Ok(BulkResult::empty());
        }
        self.coordinator.get_all(&keys).map(BulkResult::from_map)
    }

    /// Like [`get_all`](Self::get_all) for callers whose key sequence, or
    /// any of its elements, may be missing.
    ///
    /// The whole sequence is validated before any lookup, so a rejected call
    /// leaves the cache and its stats unchanged.
    pub fn get_all_checked<I>(&self, keys: Option<I>) -> Result<BulkResult<K, V>, CacheError>
    where
        I: IntoIterator<Item = Option<K>>,
    {
        let keys = keys.ok_or(CacheError::InvalidArgument("keys must not be null"))?;
        let keys = keys
            .into_iter()
            .collect::<Option<Vec<K>>>()
            .ok_or(CacheError::InvalidArgument("keys must not contain null"))?;
        self.get_all(keys)
    }

    /// Returns the stored value for `key` without loading.
    pub fn get_if_present(&self, key: &K) -> Option<Arc<V>> {
        let value = self.coordinator.store().get(key);
        match value {
            Some(_) => self.stats.record_hits(1),
            None => self.stats.record_misses(1),
        }
        value
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Stores `value` under `key`, returning the value it replaced.
    ///
    /// Replacing an entry notifies the removal listener with
    /// [`RemovalCause::Replaced`](crate::listener::RemovalCause::Replaced).
    pub fn put(&self, key: K, value: V) -> Result<Option<Arc<V>>, CacheError> {
        let store = self.coordinator.store();
        store
            .try_insert(key, Arc::new(value))
            .map_err(|_| CacheError::StoreFull {
                capacity: store.capacity(),
            })
    }

    /// Removes `key`, returning its value if one was stored.
    pub fn invalidate(&self, key: &K) -> Option<Arc<V>> {
        self.coordinator.store().remove(key)
    }

    /// Removes every stored entry. Loads in flight are unaffected.
    pub fn invalidate_all(&self) {
        tracing::debug!(entries = self.estimated_size(), "invalidating all entries");
        self.coordinator.store().clear();
    }

    /// Reloads `key` whether or not it is stored.
    ///
    /// A new value replaces the stored one, a not-found result removes it,
    /// and a failure leaves it in place.
    pub fn refresh(&self, key: &K) -> Result<Option<Arc<V>>, CacheError> {
        self.coordinator.refresh(key)
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Number of stored entries.
    pub fn estimated_size(&self) -> usize {
        self.coordinator.store().len()
    }

    /// Point-in-time copy of the stored entries.
    pub fn as_map(&self) -> BulkResult<K, V> {
        let entries: FxHashMap<K, Arc<V>> = self.coordinator.store().entries().into_iter().collect();
        BulkResult::from_map(entries)
    }

    /// Snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Number of loads currently in flight.
    pub fn in_flight(&self) -> usize {
        self.coordinator.in_flight()
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn ConcurrentStore<K, V>> {
        self.coordinator.store()
    }
}

/// Drops repeated keys, keeping first occurrences in order.
fn distinct<K, I>(keys: I) -> Vec<K>
where
    K: Clone + Eq + Hash,
    I: IntoIterator<Item = K>,
{
    let keys = keys.into_iter();
    let mut seen = FxHashSet::default();
    seen.reserve(keys.size_hint().0);
    keys.filter(|key| seen.insert(key.clone())).collect()
}
