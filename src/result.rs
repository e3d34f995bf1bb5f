//! Immutable results of bulk reads.
//!
//! A [`BulkResult`] is built once by the cache and handed to the caller. It
//! owns its own map of `Arc<V>` handles, so nothing done to it can reach the
//! store. The `try_*` mutators exist for callers that treat results as
//! generic maps; they always fail with [`CacheError::ImmutableResult`].
//!
//! ```
//! use loadkit::builder::CacheBuilder;
//! use loadkit::error::CacheError;
//! use loadkit::loader::loader_fn;
//!
//! let cache = CacheBuilder::new(16).build(loader_fn(|k: &u32| Ok(*k + 1)));
//! let mut result = cache.get_all([1, 2]).unwrap();
//!
//! assert_eq!(result.get(&1).map(|v| **v), Some(2));
//! assert!(matches!(result.try_clear(), Err(CacheError::ImmutableResult)));
//! assert_eq!(result.len(), 2);
//! ```

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::ops::Index;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::CacheError;

/// Immutable mapping from requested keys to resolved values.
///
/// Never contains keys whose load failed or reported no value.
#[derive(Clone)]
pub struct BulkResult<K, V> {
    entries: FxHashMap<K, Arc<V>>,
}

impl<K, V> BulkResult<K, V> {
    pub(crate) fn from_map(entries: FxHashMap<K, Arc<V>>) -> Self {
        Self { entries }
    }

    /// An empty result.
    pub fn empty() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Arc<V>> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Arc<V>)> {
        self.entries.iter()
    }

    /// Always fails: results cannot gain entries.
    pub fn try_insert(&mut self, _key: K, _value: V) -> Result<Option<Arc<V>>, CacheError> {
        Err(CacheError::ImmutableResult)
    }

    /// Always fails: results cannot lose entries.
    pub fn try_remove<Q>(&mut self, _key: &Q) -> Result<Option<Arc<V>>, CacheError>
    where
        K: Borrow<Q>,
        Q: ?Sized,
    {
        Err(CacheError::ImmutableResult)
    }

    /// Always fails: results cannot be cleared.
    pub fn try_clear(&mut self) -> Result<(), CacheError> {
        Err(CacheError::ImmutableResult)
    }
}

impl<K, V> BulkResult<K, V>
where
    K: Eq + Hash,
{
    pub fn get<Q>(&self, key: &Q) -> Option<&Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Copies the entries into a caller-owned map.
    pub fn to_hash_map(&self) -> HashMap<K, Arc<V>>
    where
        K: Clone,
    {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Returns `true` if this result holds exactly the entries of `other`,
    /// compared by value.
    pub fn matches<S>(&self, other: &HashMap<K, V, S>) -> bool
    where
        V: PartialEq,
        S: BuildHasher,
    {
        self.entries.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| **v == *o))
    }
}

impl<K, V> Default for BulkResult<K, V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K: Eq + Hash, V: PartialEq> PartialEq for BulkResult<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Eq + Hash, V: Eq> Eq for BulkResult<K, V> {}

impl<K, V, Q> Index<&Q> for BulkResult<K, V>
where
    K: Eq + Hash + Borrow<Q>,
    Q: Eq + Hash + ?Sized,
{
    type Output = Arc<V>;

    fn index(&self, key: &Q) -> &Arc<V> {
        &self.entries[key]
    }
}

impl<'a, K, V> IntoIterator for &'a BulkResult<K, V> {
    type Item = (&'a K, &'a Arc<V>);
    type IntoIter = std::collections::hash_map::Iter<'a, K, Arc<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for BulkResult<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}
