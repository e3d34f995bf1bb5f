//! Loader capabilities and the adapter that drives them.
//!
//! ## Architecture
//!
//! ```text
//!   CacheLoader<K, V> (user supplied)
//!     load(&K)      -> Result<Option<V>, LoadError>      required
//!     load_all(&[K]) -> Result<HashMap<K, V>, LoadError>  optional, see supports_bulk_load()
//!              │
//!              ▼
//!   LoaderAdapter ── timing + stats ── MissingKeyPolicy
//!              │
//!              ├── bulk supported:   one load_all() for the whole batch
//!              └── bulk unsupported: load() per key, in request order
//! ```
//!
//! ## Not Found vs. Failure
//!
//! `Ok(None)` from `load` means the key has no value. It is not cached and is
//! not an error. A bulk loader may return fewer entries than requested; what
//! that means is decided by [`MissingKeyPolicy`], configured per cache.
//!
//! ## Example Usage
//!
//! ```
//! use std::collections::HashMap;
//!
//! use loadkit::builder::CacheBuilder;
//! use loadkit::loader::bulk_loader_fn;
//!
//! let cache = CacheBuilder::new(64).build(bulk_loader_fn(
//!     |k: &u32| Ok(Some(k.to_string())),
//!     |keys: &[u32]| Ok(keys.iter().map(|k| (*k, k.to_string())).collect::<HashMap<_, _>>()),
//! ));
//!
//! let result = cache.get_all([1, 2, 3]).unwrap();
//! assert_eq!(result.len(), 3);
//! assert_eq!(cache.stats().load_success_count, 1);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::error::LoadError;
use crate::stats::StatsCounter;

/// Computes values for keys missing from the cache.
pub trait CacheLoader<K, V>: Send + Sync {
    /// Computes the value for `key`, or `Ok(None)` if it has none.
    fn load(&self, key: &K) -> Result<Option<V>, LoadError>;

    /// Computes values for several keys in one call.
    ///
    /// Only called when [`supports_bulk_load`](Self::supports_bulk_load)
    /// returns `true`. The returned map may omit requested keys and may
    /// contain keys that were not requested.
    fn load_all(&self, keys: &[K]) -> Result<HashMap<K, V>, LoadError>
    where
        K: Clone + Eq + Hash,
    {
        let mut loaded = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.load(key)? {
                loaded.insert(key.clone(), value);
            }
        }
        Ok(loaded)
    }

    /// Whether `load_all` is a real batch operation.
    fn supports_bulk_load(&self) -> bool {
        false
    }
}

/// How keys omitted from a bulk loader's result are treated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MissingKeyPolicy {
    /// The key has no value: absent from the result, no error.
    #[default]
    NotFound,
    /// Retry each omitted key once with the single-key loader.
    LoadIndividually,
    /// Fail the whole batch.
    Fail,
}

// ---------------------------------------------------------------------------
// Closure adapters
// ---------------------------------------------------------------------------

/// Loader built from a closure that always produces a value.
pub struct FnLoader<F>(F);

/// Loader built from a closure that may report a key as not found.
pub struct OptionalFnLoader<F>(F);

/// Loader built from a single-key and a bulk closure.
pub struct BulkFnLoader<F, G> {
    single: F,
    bulk: G,
}

/// Wraps `f` as a loader whose every successful call yields a value.
pub fn loader_fn<K, V, F>(f: F) -> FnLoader<F>
where
    F: Fn(&K) -> Result<V, LoadError> + Send + Sync,
{
    FnLoader(f)
}

/// Wraps `f` as a loader that may return `Ok(None)` for unknown keys.
pub fn optional_loader_fn<K, V, F>(f: F) -> OptionalFnLoader<F>
where
    F: Fn(&K) -> Result<Option<V>, LoadError> + Send + Sync,
{
    OptionalFnLoader(f)
}

/// Wraps a single-key closure and a bulk closure as one loader.
pub fn bulk_loader_fn<K, V, F, G>(single: F, bulk: G) -> BulkFnLoader<F, G>
where
    F: Fn(&K) -> Result<Option<V>, LoadError> + Send + Sync,
    G: Fn(&[K]) -> Result<HashMap<K, V>, LoadError> + Send + Sync,
{
    BulkFnLoader { single, bulk }
}

impl<K, V, F> CacheLoader<K, V> for FnLoader<F>
where
    F: Fn(&K) -> Result<V, LoadError> + Send + Sync,
{
    fn load(&self, key: &K) -> Result<Option<V>, LoadError> {
        (self.0)(key).map(Some)
    }
}

impl<K, V, F> CacheLoader<K, V> for OptionalFnLoader<F>
where
    F: Fn(&K) -> Result<Option<V>, LoadError> + Send + Sync,
{
    fn load(&self, key: &K) -> Result<Option<V>, LoadError> {
        (self.0)(key)
    }
}

impl<K, V, F, G> CacheLoader<K, V> for BulkFnLoader<F, G>
where
    F: Fn(&K) -> Result<Option<V>, LoadError> + Send + Sync,
    G: Fn(&[K]) -> Result<HashMap<K, V>, LoadError> + Send + Sync,
{
    fn load(&self, key: &K) -> Result<Option<V>, LoadError> {
        (self.single)(key)
    }

    fn load_all(&self, keys: &[K]) -> Result<HashMap<K, V>, LoadError>
    where
        K: Clone + Eq + Hash,
    {
        (self.bulk)(keys)
    }

    fn supports_bulk_load(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// LoaderAdapter
// ---------------------------------------------------------------------------

/// Result of loading one key: a value, not found, or a shared failure.
pub(crate) type KeyOutcome<V> = Result<Option<V>, Arc<LoadError>>;

/// Per-key outcomes of a batch, plus entries for keys nobody asked for.
pub(crate) struct BatchLoad<K, V> {
    pub(crate) outcomes: FxHashMap<K, KeyOutcome<V>>,
    pub(crate) extras: Vec<(K, V)>,
}

/// Uniform front for single-key and bulk loading.
///
/// Times every loader invocation and records its outcome on the cache's
/// [`StatsCounter`].
pub struct LoaderAdapter<K, V> {
    loader: Arc<dyn CacheLoader<K, V>>,
    missing_keys: MissingKeyPolicy,
    stats: Arc<dyn StatsCounter>,
}

impl<K, V> fmt::Debug for LoaderAdapter<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderAdapter")
            .field("bulk", &self.loader.supports_bulk_load())
            .field("missing_keys", &self.missing_keys)
            .finish()
    }
}

impl<K, V> LoaderAdapter<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn new(
        loader: Arc<dyn CacheLoader<K, V>>,
        missing_keys: MissingKeyPolicy,
        stats: Arc<dyn StatsCounter>,
    ) -> Self {
        Self {
            loader,
            missing_keys,
            stats,
        }
    }

    pub fn supports_bulk_load(&self) -> bool {
        self.loader.supports_bulk_load()
    }

    pub fn missing_key_policy(&self) -> MissingKeyPolicy {
        self.missing_keys
    }

    /// Loads one key, recording the outcome.
    pub(crate) fn load_one(&self, key: &K) -> KeyOutcome<V> {
        let start = Instant::now();
        match self.loader.load(key) {
            Ok(value) => {
                self.stats.record_load_success(start.elapsed());
                Ok(value)
            },
            Err(err) => {
                self.stats.record_load_failure(start.elapsed());
                Err(Arc::new(err))
            },
        }
    }

    /// Loads a batch of distinct keys.
    ///
    /// Every key in `keys` gets an entry in `outcomes`. Without bulk support
    /// every key is loaded even if an earlier one failed, so each key's
    /// outcome is its own.
    pub(crate) fn load_batch(&self, keys: &[K]) -> BatchLoad<K, V> {
        if !self.loader.supports_bulk_load() {
            let outcomes = keys
                .iter()
                .map(|key| (key.clone(), self.load_one(key)))
                .collect();
            return BatchLoad {
                outcomes,
                extras: Vec::new(),
            };
        }

        let start = Instant::now();
        let loaded = match self.loader.load_all(keys) {
            Ok(loaded) => loaded,
            Err(err) => {
                self.stats.record_load_failure(start.elapsed());
                let err = Arc::new(err);
                return BatchLoad {
                    outcomes: keys
                        .iter()
                        .map(|key| (key.clone(), Err(err.clone())))
                        .collect(),
                    extras: Vec::new(),
                };
            },
        };
        let elapsed = start.elapsed();
        self.split_bulk_result(keys, loaded, elapsed)
    }

    fn split_bulk_result(
        &self,
        keys: &[K],
        mut loaded: HashMap<K, V>,
        elapsed: std::time::Duration,
    ) -> BatchLoad<K, V> {
        let omitted: Vec<&K> = keys.iter().filter(|k| !loaded.contains_key(*k)).collect();

        if !omitted.is_empty() && self.missing_keys == MissingKeyPolicy::Fail {
            self.stats.record_load_failure(elapsed);
            let err = Arc::new(LoadError::new(format!(
                "bulk loader omitted {} of {} requested keys",
                omitted.len(),
                keys.len()
            )));
            return BatchLoad {
                outcomes: keys
                    .iter()
                    .map(|key| (key.clone(), Err(err.clone())))
                    .collect(),
                extras: Vec::new(),
            };
        }
        self.stats.record_load_success(elapsed);

        let mut outcomes = FxHashMap::default();
        outcomes.reserve(keys.len());
        for key in keys {
            let outcome = match loaded.remove(key) {
                Some(value) => Ok(Some(value)),
                None if self.missing_keys == MissingKeyPolicy::LoadIndividually => {
                    self.load_one(key)
                },
                None => Ok(None),
            };
            outcomes.insert(key.clone(), outcome);
        }

        BatchLoad {
            outcomes,
            extras: loaded.into_iter().collect(),
        }
    }
}
