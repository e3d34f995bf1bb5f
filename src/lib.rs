//! loadkit: a concurrent loading cache with single-flight load coordination.
//!
//! A [`LoadingCache`](cache::LoadingCache) computes absent values with a
//! user-supplied [`CacheLoader`](loader::CacheLoader). Any number of threads
//! may read concurrently; for each absent key at most one load runs at a time
//! and every caller for that key receives its outcome.
//!
//! ```
//! use loadkit::prelude::*;
//!
//! let cache = CacheBuilder::new(1_024).build(loader_fn(|k: &i64| Ok(-k)));
//!
//! assert_eq!(cache.get(&5).unwrap().as_deref(), Some(&-5));
//! assert_eq!(cache.get(&5).unwrap().as_deref(), Some(&-5));
//!
//! let stats = cache.stats();
//! assert_eq!((stats.hit_count, stats.miss_count), (1, 1));
//! ```
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod builder;
pub mod cache;
pub mod coordinator;
pub mod ds;
pub mod error;
pub mod listener;
pub mod loader;
pub mod result;
pub mod stats;
pub mod store;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;

pub use crate::builder::{CacheBuilder, CacheConfig};
pub use crate::cache::LoadingCache;
pub use crate::ds::ShardSelector;
pub use crate::error::{CacheError, ConfigError, LoadError};
#[cfg(feature = "metrics")]
pub use crate::metrics::snapshot::CacheMetricsSnapshot;
pub use crate::result::BulkResult;
pub use crate::stats::CacheStats;
