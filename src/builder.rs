//! Builder for loading caches.
//!
//! Collects the capacity, store layout, statistics, listener, and bulk-load
//! policy, then wires the store, loader adapter, and load coordinator
//! together behind a [`LoadingCache`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use loadkit::builder::CacheBuilder;
//! use loadkit::listener::NoopListener;
//! use loadkit::loader::{MissingKeyPolicy, loader_fn};
//! use loadkit::stats::ConcurrentStatsCounter;
//!
//! let stats = Arc::new(ConcurrentStatsCounter::new());
//! let cache = CacheBuilder::new(1_000)
//!     .shards(8)
//!     .registry_shards(32)
//!     .stats_counter(stats.clone())
//!     .removal_listener(NoopListener)
//!     .missing_key_policy(MissingKeyPolicy::LoadIndividually)
//!     .try_build(loader_fn(|k: &u64| Ok(k.to_string())))
//!     .unwrap();
//!
//! cache.get(&1).unwrap();
//! assert_eq!(cache.stats().miss_count, 1);
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::cache::LoadingCache;
use crate::coordinator::LoadCoordinator;
use crate::error::ConfigError;
use crate::listener::{NoopListener, RemovalListener};
use crate::loader::{CacheLoader, LoaderAdapter, MissingKeyPolicy};
use crate::stats::{ConcurrentStatsCounter, DisabledStatsCounter, StatsCounter};
use crate::store::hashmap::{ConcurrentHashMapStore, ShardedHashMapStore};
use crate::store::traits::ConcurrentStore;

/// Plain configuration values used by [`CacheBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of stored entries.
    pub max_capacity: usize,
    /// Lock shards in the store. `1` selects the single-lock store.
    pub store_shards: usize,
    /// Lock shards in the in-flight load registry.
    pub registry_shards: usize,
    /// Whether hits, misses, and loads are counted.
    pub record_stats: bool,
    /// How bulk loads treat requested keys they did not return.
    pub missing_key_policy: MissingKeyPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            store_shards: 1,
            registry_shards: 16,
            record_stats: true,
            missing_key_policy: MissingKeyPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Checks every parameter, naming the first invalid one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_capacity == 0 {
            return Err(ConfigError::new("max_capacity must be > 0"));
        }
        if self.store_shards == 0 {
            return Err(ConfigError::new("shards must be > 0"));
        }
        if self.store_shards > self.max_capacity {
            return Err(ConfigError::new(format!(
                "shards ({}) must not exceed max_capacity ({})",
                self.store_shards, self.max_capacity
            )));
        }
        if self.registry_shards == 0 {
            return Err(ConfigError::new("registry_shards must be > 0"));
        }
        Ok(())
    }

    /// Replaces invalid parameters with the nearest valid ones.
    fn clamped(self) -> Self {
        let max_capacity = self.max_capacity.max(1);
        Self {
            max_capacity,
            store_shards: self.store_shards.clamp(1, max_capacity),
            registry_shards: self.registry_shards.max(1),
            ..self
        }
    }
}

/// Builder for [`LoadingCache`] instances.
pub struct CacheBuilder<K, V> {
    config: CacheConfig,
    stats: Option<Arc<dyn StatsCounter>>,
    listener: Option<Arc<dyn RemovalListener<K, V>>>,
    store: Option<Arc<dyn ConcurrentStore<K, V>>>,
}

impl<K, V> fmt::Debug for CacheBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("listener", &self.listener)
            .field("custom_store", &self.store.is_some())
            .finish()
    }
}

impl<K, V> CacheBuilder<K, V> {
    /// Create a new builder for a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self::from_config(CacheConfig {
            max_capacity: capacity,
            ..CacheConfig::default()
        })
    }

    /// Create a builder from a complete configuration.
    pub fn from_config(config: CacheConfig) -> Self {
        Self {
            config,
            stats: None,
            listener: None,
            store: None,
        }
    }

    /// Number of lock shards in the store.
    pub fn shards(mut self, shards: usize) -> Self {
        self.config.store_shards = shards;
        self
    }

    /// Number of lock shards in the in-flight load registry.
    pub fn registry_shards(mut self, shards: usize) -> Self {
        self.config.registry_shards = shards;
        self
    }

    /// Turns statistics on or off. Ignored if a counter is supplied with
    /// [`stats_counter`](Self::stats_counter).
    pub fn record_stats(mut self, enabled: bool) -> Self {
        self.config.record_stats = enabled;
        self
    }

    /// Uses `counter` for this cache's statistics.
    pub fn stats_counter(mut self, counter: Arc<dyn StatsCounter>) -> Self {
        self.stats = Some(counter);
        self
    }

    /// Installs the listener notified on explicit removals and replacements.
    pub fn removal_listener<L>(mut self, listener: L) -> Self
    where
        L: RemovalListener<K, V> + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn missing_key_policy(mut self, policy: MissingKeyPolicy) -> Self {
        self.config.missing_key_policy = policy;
        self
    }

    /// Uses a caller-supplied store instead of one of the built-in backends.
    ///
    /// The store's own listener applies; combining this with
    /// [`removal_listener`](Self::removal_listener) is a configuration error.
    pub fn store(mut self, store: Arc<dyn ConcurrentStore<K, V>>) -> Self {
        self.store = Some(store);
        self
    }

    /// The configuration collected so far.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Build the cache, clamping invalid parameters to the nearest valid
    /// values.
    ///
    /// A listener combined with a custom store is ignored with a warning;
    /// use [`try_build`](Self::try_build) to reject such configurations.
    pub fn build<L>(self, loader: L) -> LoadingCache<K, V>
    where
        L: CacheLoader<K, V> + 'static,
    {
        let config = self.config.clamped();
        if self.store.is_some() && self.listener.is_some() {
            tracing::warn!("removal listener ignored: a custom store was supplied");
        }
        self.assemble(config, Arc::new(loader))
    }

    /// Build the cache, rejecting invalid parameters.
    pub fn try_build<L>(self, loader: L) -> Result<LoadingCache<K, V>, ConfigError>
    where
        L: CacheLoader<K, V> + 'static,
    {
        self.config.validate()?;
        if self.store.is_some() && self.listener.is_some() {
            return Err(ConfigError::new(
                "removal_listener cannot be combined with a custom store",
            ));
        }
        let config = self.config;
        Ok(self.assemble(config, Arc::new(loader)))
    }

    fn assemble(self, config: CacheConfig, loader: Arc<dyn CacheLoader<K, V>>) -> LoadingCache<K, V> {
        let stats: Arc<dyn StatsCounter> = match self.stats {
            Some(stats) => stats,
            None if config.record_stats => Arc::new(ConcurrentStatsCounter::new()),
            None => Arc::new(DisabledStatsCounter),
        };
        let listener = self
            .listener
            .unwrap_or_else(|| Arc::new(NoopListener) as Arc<dyn RemovalListener<K, V>>);

        let store: Arc<dyn ConcurrentStore<K, V>> = match self.store {
            Some(store) => store,
            None if config.store_shards == 1 => Arc::new(
                ConcurrentHashMapStore::new(config.max_capacity).with_listener(listener),
            ),
            None => Arc::new(
                ShardedHashMapStore::new(config.max_capacity, config.store_shards)
                    .with_listener(listener),
            ),
        };

        tracing::debug!(
            capacity = config.max_capacity,
            store_shards = config.store_shards,
            registry_shards = config.registry_shards,
            bulk = loader.supports_bulk_load(),
            "building loading cache"
        );

        let adapter = LoaderAdapter::new(loader, config.missing_key_policy, stats.clone());
        let coordinator = LoadCoordinator::new(store, adapter, stats.clone(), config.registry_shards);
        LoadingCache::new(coordinator, stats)
    }
}
