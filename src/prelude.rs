pub use crate::builder::{CacheBuilder, CacheConfig};
pub use crate::cache::LoadingCache;
pub use crate::error::{CacheError, ConfigError, LoadError};
pub use crate::listener::{NoopListener, RejectingListener, RemovalCause, RemovalListener, listener_fn};
pub use crate::loader::{
    CacheLoader, MissingKeyPolicy, bulk_loader_fn, loader_fn, optional_loader_fn,
};
pub use crate::result::BulkResult;
pub use crate::stats::{CacheStats, ConcurrentStatsCounter, DisabledStatsCounter, StatsCounter};
pub use crate::store::{ConcurrentHashMapStore, ConcurrentStore, ShardedHashMapStore, StoreCore};
