//! Single-flight load coordination.
//!
//! The coordinator sits between the cache façade and the store. For every
//! key that is absent from the store it guarantees that exactly one caller
//! runs the loader while every other caller for that key attaches to the
//! same [`LoadRequest`] and observes the same outcome.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌────────────────────────────────────────────┐
//!   get / get_all ──►│ fast path: store.get(key)  ── hit ──► done │
//!                    └──────────────────┬─────────────────────────┘
//!                                       │ absent
//!                                       ▼
//!               ┌───────────────────────────────────────────────┐
//!               │ registry shard lock (ShardSelector(key))      │
//!               │   store has key?        ─► Present            │
//!               │   request in flight?    ─► Waiter(request)    │
//!               │   otherwise register    ─► Loader(ticket)     │
//!               └───────────────────────────────────────────────┘
//!                     │ Loader                        │ Waiter
//!                     ▼                               ▼
//!          LoaderAdapter::load_one/batch      request.wait()  (Condvar)
//!                     │                               ▲
//!                     ▼                               │
//!          store.insert_if_absent ─► unregister ─► publish
//! ```
//!
//! ## Per-Key State Machine
//!
//! ```text
//!   Idle ──register──► Loading ──publish──► Resolved ──last Arc dropped──► (gone)
//! ```
//!
//! ## Invariants
//!
//! - Registration and the store presence check happen under the same
//!   registry-shard lock, so two callers never both own one key.
//! - A loader stores its value before unregistering, and unregisters before
//!   publishing. A caller that misses the registry entry therefore finds the
//!   value in the store.
//! - A caller resolves every load it owns before waiting on another caller's
//!   load, so overlapping bulk requests cannot deadlock.
//! - Failures are published to every waiter and then forgotten; the next
//!   caller retries.
//! - A load ticket dropped without completing (loader panic, early
//!   return) publishes a failure, so waiters never block forever.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use crate::ds::ShardSelector;
use crate::error::{CacheError, LoadError};
use crate::loader::{KeyOutcome, LoaderAdapter};
use crate::stats::StatsCounter;
use crate::store::traits::{ConcurrentStore, StoreCore};

/// Outcome delivered to every caller of one load.
pub(crate) type SharedOutcome<V> = KeyOutcome<Arc<V>>;

// ---------------------------------------------------------------------------
// LoadRequest
// ---------------------------------------------------------------------------

enum RequestState<V> {
    Loading,
    Resolved(SharedOutcome<V>),
}

/// In-flight load for one key: a single-assignment outcome slot.
pub struct LoadRequest<V> {
    state: Mutex<RequestState<V>>,
    resolved: Condvar,
    owner: ThreadId,
}

impl<V> LoadRequest<V> {
    fn new() -> Self {
        Self {
            state: Mutex::new(RequestState::Loading),
            resolved: Condvar::new(),
            owner: thread::current().id(),
        }
    }

    /// Blocks until the owning caller publishes, then returns its outcome.
    pub(crate) fn wait(&self) -> SharedOutcome<V> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                RequestState::Resolved(outcome) => return outcome.clone(),
                RequestState::Loading => self.resolved.wait(&mut state),
            }
        }
    }

    /// Returns `true` once an outcome has been published.
    pub fn is_resolved(&self) -> bool {
        matches!(*self.state.lock(), RequestState::Resolved(_))
    }

    fn publish(&self, outcome: SharedOutcome<V>) {
        let mut state = self.state.lock();
        debug_assert!(matches!(*state, RequestState::Loading));
        *state = RequestState::Resolved(outcome);
        drop(state);
        self.resolved.notify_all();
    }
}

impl<V> fmt::Debug for LoadRequest<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadRequest")
            .field("resolved", &self.is_resolved())
            .field("owner", &self.owner)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LoadTicket
// ---------------------------------------------------------------------------

/// How a completed load is written back to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreWrite {
    /// Read path: never overwrite, never remove.
    IfAbsent,
    /// Refresh path: overwrite on value, remove on not-found.
    Replace,
}

/// Ownership of one in-flight load.
///
/// Must be completed with `complete`; dropping it early
/// publishes a failure to the attached waiters.
struct LoadTicket<'a, K, V>
where
    K: Clone + Eq + Hash,
{
    coordinator: &'a LoadCoordinator<K, V>,
    key: K,
    request: Arc<LoadRequest<V>>,
    completed: bool,
}

impl<K, V> LoadTicket<'_, K, V>
where
    K: Clone + Eq + Hash,
{
    /// Writes the outcome back, then unregisters and publishes it.
    ///
    /// The store write may run a removal listener. If that panics the ticket
    /// is still uncompleted, so its drop guard releases the waiters.
    fn complete(mut self, outcome: KeyOutcome<V>, write: StoreWrite) -> SharedOutcome<V> {
        let shared = match outcome {
            Ok(Some(value)) => Ok(Some(self.coordinator.write_back(&self.key, value, write))),
            Ok(None) => {
                if write == StoreWrite::Replace {
                    self.coordinator.store.remove(&self.key);
                }
                Ok(None)
            },
            Err(err) => {
                tracing::warn!(error = %err, "load failed");
                Err(err)
            },
        };
        self.completed = true;
        self.coordinator.unregister(&self.key, &self.request);
        self.request.publish(shared.clone());
        shared
    }
}

impl<K, V> Drop for LoadTicket<'_, K, V>
where
    K: Clone + Eq + Hash,
{
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        tracing::warn!("load abandoned before completion");
        self.coordinator.unregister(&self.key, &self.request);
        self.request.publish(Err(Arc::new(LoadError::new(
            "load abandoned before completion (loader panicked or caller bailed out)",
        ))));
    }
}

enum Claim<'a, K, V>
where
    K: Clone + Eq + Hash,
{
    Present(Arc<V>),
    Loader(LoadTicket<'a, K, V>),
    Waiter(Arc<LoadRequest<V>>),
}

// ---------------------------------------------------------------------------
// LoadCoordinator
// ---------------------------------------------------------------------------

type RegistryShard<K, V> = Mutex<FxHashMap<K, Arc<LoadRequest<V>>>>;

/// Coordinates loads so each absent key is computed by exactly one caller.
pub struct LoadCoordinator<K, V> {
    store: Arc<dyn ConcurrentStore<K, V>>,
    loader: LoaderAdapter<K, V>,
    stats: Arc<dyn StatsCounter>,
    selector: ShardSelector,
    registry: Vec<RegistryShard<K, V>>,
}

impl<K, V> fmt::Debug for LoadCoordinator<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadCoordinator")
            .field("loader", &self.loader)
            .field("registry_shards", &self.registry.len())
            .finish()
    }
}

impl<K, V> LoadCoordinator<K, V>
where
    K: Clone + Eq + Hash,
{
    pub fn new(
        store: Arc<dyn ConcurrentStore<K, V>>,
        loader: LoaderAdapter<K, V>,
        stats: Arc<dyn StatsCounter>,
        registry_shards: usize,
    ) -> Self {
        let selector = ShardSelector::new(registry_shards, 0);
        let registry = (0..selector.shard_count())
            .map(|_| Mutex::new(FxHashMap::default()))
            .collect();
        Self {
            store,
            loader,
            stats,
            selector,
            registry,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConcurrentStore<K, V>> {
        &self.store
    }

    pub fn loader(&self) -> &LoaderAdapter<K, V> {
        &self.loader
    }

    /// Number of loads currently in flight.
    pub fn in_flight(&self) -> usize {
        self.registry.iter().map(|shard| shard.lock().len()).sum()
    }

    fn shard(&self, key: &K) -> &RegistryShard<K, V> {
        &self.registry[self.selector.shard_for_key(key)]
    }

    /// Resolves `key` as present, owned by this caller, or in flight.
    ///
    /// With `check_store == false` presence is ignored and the caller becomes
    /// loader unless a load is already in flight (refresh).
    fn claim(&self, key: &K, check_store: bool) -> Result<Claim<'_, K, V>, CacheError> {
        let mut shard = self.shard(key).lock();
        if let Some(request) = shard.get(key) {
            if request.owner == thread::current().id() {
                return Err(CacheError::RecursiveLoad);
            }
            return Ok(Claim::Waiter(request.clone()));
        }
        if check_store {
            if let Some(value) = self.store.peek(key) {
                return Ok(Claim::Present(value));
            }
        }
        let request = Arc::new(LoadRequest::new());
        shard.insert(key.clone(), request.clone());
        Ok(Claim::Loader(LoadTicket {
            coordinator: self,
            key: key.clone(),
            request,
            completed: false,
        }))
    }

    /// Returns `true` if this thread is already loading `key`.
    ///
    /// Only the owning thread registers or removes its own requests, so the
    /// answer cannot change while this thread is asking.
    fn loading_on_this_thread(&self, key: &K) -> bool {
        let me = thread::current().id();
        self.shard(key)
            .lock()
            .get(key)
            .is_some_and(|request| request.owner == me)
    }

    fn unregister(&self, key: &K, request: &Arc<LoadRequest<V>>) {
        let mut shard = self.shard(key).lock();
        if shard
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, request))
        {
            shard.remove(key);
        }
    }

    fn write_back(&self, key: &K, value: V, write: StoreWrite) -> Arc<V> {
        let value = Arc::new(value);
        let stored = match write {
            StoreWrite::IfAbsent => self.store.insert_if_absent(key.clone(), value.clone()),
            StoreWrite::Replace => self
                .store
                .try_insert(key.clone(), value.clone())
                .map(|_| value.clone()),
        };
        stored.unwrap_or_else(|_| {
            tracing::warn!(
                capacity = self.store.capacity(),
                "store full, returning loaded value without caching it"
            );
            value
        })
    }

    // -----------------------------------------------------------------------
    // Single key
    // -----------------------------------------------------------------------

    /// Returns the stored value for `key`, loading it if absent.
    pub fn get(&self, key: &K) -> Result<Option<Arc<V>>, CacheError> {
        if let Some(value) = self.store.get(key) {
            self.stats.record_hits(1);
            return Ok(Some(value));
        }

        match self.claim(key, true)? {
            Claim::Present(value) => {
                self.stats.record_hits(1);
                Ok(Some(value))
            },
            Claim::Loader(ticket) => {
                self.stats.record_misses(1);
                tracing::debug!("loading absent key");
                let outcome = self.loader.load_one(key);
                ticket
                    .complete(outcome, StoreWrite::IfAbsent)
                    .map_err(CacheError::Load)
            },
            Claim::Waiter(request) => {
                self.stats.record_misses(1);
                tracing::trace!("attaching to in-flight load");
                request.wait().map_err(CacheError::Load)
            },
        }
    }

    /// Reloads `key` even if present, replacing or removing the stored entry.
    ///
    /// If a load for `key` is already in flight its outcome is returned
    /// instead of starting a second one. A failed reload leaves the stored
    /// value untouched.
    pub fn refresh(&self, key: &K) -> Result<Option<Arc<V>>, CacheError> {
        match self.claim(key, false)? {
            Claim::Loader(ticket) => {
                tracing::debug!("refreshing key");
                let outcome = self.loader.load_one(key);
                ticket
                    .complete(outcome, StoreWrite::Replace)
                    .map_err(CacheError::Load)
            },
            Claim::Waiter(request) => request.wait().map_err(CacheError::Load),
            Claim::Present(value) => Ok(Some(value)),
        }
    }

    // -----------------------------------------------------------------------
    // Bulk
    // -----------------------------------------------------------------------

    /// Resolves every key in `keys`, loading the absent ones.
    ///
    /// `keys` must be free of duplicates. Keys the loader reports as not
    /// found are left out of the returned map. The first failure observed is
    /// returned only after every load this caller owns has been published.
    ///
    /// A recursive request is rejected before any key is claimed, so no
    /// other caller ever attaches to a load this call would abandon.
    pub fn get_all(&self, keys: &[K]) -> Result<FxHashMap<K, Arc<V>>, CacheError> {
        if keys.iter().any(|key| self.loading_on_this_thread(key)) {
            return Err(CacheError::RecursiveLoad);
        }

        let mut found = FxHashMap::default();
        found.reserve(keys.len());
        let mut owned = Vec::new();
        let mut waiting = Vec::new();

        for key in keys {
            if let Some(value) = self.store.get(key) {
                found.insert(key.clone(), value);
                continue;
            }
            match self.claim(key, true)? {
                Claim::Present(value) => {
                    found.insert(key.clone(), value);
                },
                Claim::Loader(ticket) => owned.push(ticket),
                Claim::Waiter(request) => waiting.push((key.clone(), request)),
            }
        }

        self.stats.record_hits(found.len() as u64);
        self.stats.record_misses((owned.len() + waiting.len()) as u64);

        let mut first_error = None;

        if !owned.is_empty() {
            tracing::debug!(
                keys = owned.len(),
                bulk = self.loader.supports_bulk_load(),
                "loading absent keys"
            );
            let batch_keys: Vec<K> = owned.iter().map(|ticket| ticket.key.clone()).collect();
            let mut batch = self.loader.load_batch(&batch_keys);

            for (key, value) in batch.extras.drain(..) {
                self.write_back(&key, value, StoreWrite::IfAbsent);
            }

            for ticket in owned {
                let outcome = batch.outcomes.remove(&ticket.key).unwrap_or(Ok(None));
                let key = ticket.key.clone();
                match ticket.complete(outcome, StoreWrite::IfAbsent) {
                    Ok(Some(value)) => {
                        found.insert(key, value);
                    },
                    Ok(None) => {},
                    Err(err) => {
                        first_error.get_or_insert(err);
                    },
                }
            }
        }

        if let Some(err) = first_error {
            return Err(CacheError::Load(err));
        }

        for (key, request) in waiting {
            tracing::trace!("waiting on in-flight load for bulk request");
            match request.wait() {
                Ok(Some(value)) => {
                    found.insert(key, value);
                },
                Ok(None) => {},
                Err(err) => return Err(CacheError::Load(err)),
            }
        }

        Ok(found)
    }
}
