//! Removal notification hooks.
//!
//! Stores call a [`RemovalListener`] whenever an entry leaves the table or is
//! overwritten. The loading path never removes or replaces entries (loaded
//! values are written with insert-if-absent), so reads never reach the
//! listener. [`RejectingListener`] exists to prove exactly that in tests.
//!
//! ## Example Usage
//!
//! ```
//! use loadkit::builder::CacheBuilder;
//! use loadkit::listener::RejectingListener;
//! use loadkit::loader::loader_fn;
//!
//! let cache = CacheBuilder::new(16)
//!     .removal_listener(RejectingListener)
//!     .build(loader_fn(|k: &i64| Ok(-k)));
//!
//! // Loads populate the store without notifying the listener
//! assert_eq!(cache.get(&5).unwrap().as_deref(), Some(&-5));
//! ```

use std::fmt::Debug;
use std::sync::Arc;

/// Why an entry left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalCause {
    /// Removed by an explicit `remove`/`invalidate`/`clear`.
    Explicit,
    /// Overwritten by an insert for the same key.
    Replaced,
}

/// Receives removal events from a store.
///
/// Called synchronously on the thread that performed the removal, after the
/// store lock has been released.
pub trait RemovalListener<K, V>: Debug + Send + Sync {
    fn on_removal(&self, key: &K, value: &Arc<V>, cause: RemovalCause);
}

/// Listener that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl<K, V> RemovalListener<K, V> for NoopListener {
    fn on_removal(&self, _key: &K, _value: &Arc<V>, _cause: RemovalCause) {}
}

/// Listener that panics on any notification.
///
/// Installs a hard failure on the removal path, for asserting that an
/// operation never removes or replaces entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectingListener;

impl<K: Debug, V> RemovalListener<K, V> for RejectingListener {
    fn on_removal(&self, key: &K, _value: &Arc<V>, cause: RemovalCause) {
        panic!("unexpected removal notification for {key:?} ({cause:?})");
    }
}

impl<K, V, L> RemovalListener<K, V> for Arc<L>
where
    L: RemovalListener<K, V> + ?Sized,
{
    fn on_removal(&self, key: &K, value: &Arc<V>, cause: RemovalCause) {
        (**self).on_removal(key, value, cause)
    }
}

/// Adapts a closure into a [`RemovalListener`].
pub struct FnListener<F>(F);

impl<F> Debug for FnListener<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnListener")
    }
}

impl<K, V, F> RemovalListener<K, V> for FnListener<F>
where
    F: Fn(&K, &Arc<V>, RemovalCause) + Send + Sync,
{
    fn on_removal(&self, key: &K, value: &Arc<V>, cause: RemovalCause) {
        (self.0)(key, value, cause)
    }
}

/// Wraps a closure as a shareable removal listener.
pub fn listener_fn<K, V, F>(f: F) -> Arc<dyn RemovalListener<K, V>>
where
    K: 'static,
    V: 'static,
    F: Fn(&K, &Arc<V>, RemovalCause) + Send + Sync + 'static,
{
    Arc::new(FnListener(f))
}
