use std::hash::Hash;

use crate::cache::LoadingCache;
use crate::metrics::traits::MetricsSnapshotProvider;
use crate::stats::CacheStats;
use crate::store::traits::StoreCore;

/// Statistics plus occupancy of one loading cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub stats: CacheStats,
    pub cache_len: usize,
    pub capacity: usize,
    pub in_flight: usize,
}

impl<K, V> MetricsSnapshotProvider<CacheMetricsSnapshot> for LoadingCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            stats: self.stats(),
            cache_len: self.estimated_size(),
            capacity: self.store().capacity(),
            in_flight: self.in_flight(),
        }
    }
}

impl<K, V> MetricsSnapshotProvider<CacheStats> for LoadingCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn snapshot(&self) -> CacheStats {
        self.stats()
    }
}
