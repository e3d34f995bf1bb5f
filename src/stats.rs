//! Hit/miss and load statistics for loading caches.
//!
//! ## Architecture
//!
//! ```text
//!   LoadingCache ──record_hits / record_misses──────────┐
//!        │                                              ▼
//!        └──► LoadCoordinator ──record_load_*──► StatsCounter (trait)
//!                                                   │
//!                         ┌─────────────────────────┴───────────────┐
//!                         ▼                                         ▼
//!              ConcurrentStatsCounter                      DisabledStatsCounter
//!              (per-field AtomicU64)                       (no-op)
//!                         │
//!                         ▼ snapshot()
//!                    CacheStats (Copy, immutable)
//! ```
//!
//! ## Key Components
//!
//! - [`StatsCounter`]: recording interface, injected per cache instance.
//! - [`ConcurrentStatsCounter`]: lock-free accumulator. Each field is exact;
//!   a snapshot is not atomic across fields.
//! - [`DisabledStatsCounter`]: discards everything, snapshots are all zero.
//! - [`CacheStats`]: point-in-time copy with derived rates.
//!
//! ## Counting Rules
//!
//! - One hit or one miss per key per resolved read.
//! - A miss is counted when absence is detected, whether or not the load
//!   later succeeds.
//! - One load success or failure per loader invocation (a bulk call counts
//!   once), with the elapsed time added to `total_load_time`.
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//!
//! use loadkit::stats::{ConcurrentStatsCounter, StatsCounter};
//!
//! let counter = ConcurrentStatsCounter::new();
//! counter.record_hits(3);
//! counter.record_misses(1);
//! counter.record_load_success(Duration::from_millis(4));
//!
//! let stats = counter.snapshot();
//! assert_eq!(stats.hit_count, 3);
//! assert_eq!(stats.request_count(), 4);
//! assert_eq!(stats.hit_rate(), 0.75);
//! ```

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Accumulates cache statistics.
///
/// Implementations must tolerate concurrent calls from any number of threads
/// without losing updates.
pub trait StatsCounter: Debug + Send + Sync {
    /// Records `count` cache hits.
    fn record_hits(&self, count: u64);

    /// Records `count` cache misses.
    fn record_misses(&self, count: u64);

    /// Records a loader invocation that completed without error.
    ///
    /// A load that reports the key as not found is still a success.
    fn record_load_success(&self, load_time: Duration);

    /// Records a loader invocation that failed.
    fn record_load_failure(&self, load_time: Duration);

    /// Returns a point-in-time copy of the counters.
    fn snapshot(&self) -> CacheStats;
}

// ---------------------------------------------------------------------------
// ConcurrentStatsCounter
// ---------------------------------------------------------------------------

/// Thread-safe counter backed by one atomic per field.
#[derive(Debug, Default)]
pub struct ConcurrentStatsCounter {
    hits: AtomicU64,
    misses: AtomicU64,
    load_successes: AtomicU64,
    load_failures: AtomicU64,
    total_load_nanos: AtomicU64,
}

impl ConcurrentStatsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every field of `stats` to this counter.
    ///
    /// Useful for aggregating several caches into one report.
    pub fn increment_by(&self, stats: &CacheStats) {
        self.hits.fetch_add(stats.hit_count, Ordering::Relaxed);
        self.misses.fetch_add(stats.miss_count, Ordering::Relaxed);
        self.load_successes
            .fetch_add(stats.load_success_count, Ordering::Relaxed);
        self.load_failures
            .fetch_add(stats.load_failure_count, Ordering::Relaxed);
        self.add_load_time(stats.total_load_time);
    }

    fn add_load_time(&self, load_time: Duration) {
        let nanos = u64::try_from(load_time.as_nanos()).unwrap_or(u64::MAX);
        self.total_load_nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

impl StatsCounter for ConcurrentStatsCounter {
    fn record_hits(&self, count: u64) {
        self.hits.fetch_add(count, Ordering::Relaxed);
    }

    fn record_misses(&self, count: u64) {
        self.misses.fetch_add(count, Ordering::Relaxed);
    }

    fn record_load_success(&self, load_time: Duration) {
        self.load_successes.fetch_add(1, Ordering::Relaxed);
        self.add_load_time(load_time);
    }

    fn record_load_failure(&self, load_time: Duration) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
        self.add_load_time(load_time);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            load_success_count: self.load_successes.load(Ordering::Relaxed),
            load_failure_count: self.load_failures.load(Ordering::Relaxed),
            total_load_time: Duration::from_nanos(self.total_load_nanos.load(Ordering::Relaxed)),
        }
    }
}

// ---------------------------------------------------------------------------
// DisabledStatsCounter
// ---------------------------------------------------------------------------

/// Counter that records nothing. Used when statistics are turned off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledStatsCounter;

impl StatsCounter for DisabledStatsCounter {
    fn record_hits(&self, _count: u64) {}
    fn record_misses(&self, _count: u64) {}
    fn record_load_success(&self, _load_time: Duration) {}
    fn record_load_failure(&self, _load_time: Duration) {}

    fn snapshot(&self) -> CacheStats {
        CacheStats::default()
    }
}

// ---------------------------------------------------------------------------
// CacheStats
// ---------------------------------------------------------------------------

/// Immutable snapshot of cache statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hit_count: u64,
    pub miss_count: u64,
    pub load_success_count: u64,
    pub load_failure_count: u64,
    pub total_load_time: Duration,
}

impl CacheStats {
    /// Hits plus misses.
    pub fn request_count(&self) -> u64 {
        self.hit_count.saturating_add(self.miss_count)
    }

    /// Ratio of hits to requests, `1.0` when there were no requests.
    pub fn hit_rate(&self) -> f64 {
        match self.request_count() {
            0 => 1.0,
            requests => self.hit_count as f64 / requests as f64,
        }
    }

    /// Ratio of misses to requests, `0.0` when there were no requests.
    pub fn miss_rate(&self) -> f64 {
        match self.request_count() {
            0 => 0.0,
            requests => self.miss_count as f64 / requests as f64,
        }
    }

    /// Number of loader invocations, successful or not.
    pub fn load_count(&self) -> u64 {
        self.load_success_count
            .saturating_add(self.load_failure_count)
    }

    /// Ratio of failed loads to all loads, `0.0` when nothing was loaded.
    pub fn load_failure_rate(&self) -> f64 {
        match self.load_count() {
            0 => 0.0,
            loads => self.load_failure_count as f64 / loads as f64,
        }
    }

    /// Mean time spent per loader invocation.
    pub fn average_load_penalty(&self) -> Duration {
        match self.load_count() {
            0 => Duration::ZERO,
            loads => {
                let nanos = self.total_load_time.as_nanos() / u128::from(loads);
                Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
            },
        }
    }

    /// Field-wise difference, clamped at zero.
    ///
    /// Subtracting an earlier snapshot from a later one gives the activity in
    /// between.
    pub fn minus(&self, other: &CacheStats) -> CacheStats {
        CacheStats {
            hit_count: self.hit_count.saturating_sub(other.hit_count),
            miss_count: self.miss_count.saturating_sub(other.miss_count),
            load_success_count: self
                .load_success_count
                .saturating_sub(other.load_success_count),
            load_failure_count: self
                .load_failure_count
                .saturating_sub(other.load_failure_count),
            total_load_time: self.total_load_time.saturating_sub(other.total_load_time),
        }
    }

    /// Field-wise sum, saturating on overflow.
    pub fn plus(&self, other: &CacheStats) -> CacheStats {
        CacheStats {
            hit_count: self.hit_count.saturating_add(other.hit_count),
            miss_count: self.miss_count.saturating_add(other.miss_count),
            load_success_count: self
                .load_success_count
                .saturating_add(other.load_success_count),
            load_failure_count: self
                .load_failure_count
                .saturating_add(other.load_failure_count),
            total_load_time: self.total_load_time.saturating_add(other.total_load_time),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;

    #[test]
    fn empty_snapshot_rates() {
        let stats = CacheStats::default();
        assert_eq!(stats.request_count(), 0);
        assert_eq!(stats.hit_rate(), 1.0);
        assert_eq!(stats.miss_rate(), 0.0);
        assert_eq!(stats.load_failure_rate(), 0.0);
        assert_eq!(stats.average_load_penalty(), Duration::ZERO);
    }

    #[test]
    fn counter_records_each_field() {
        let counter = ConcurrentStatsCounter::new();
        counter.record_hits(2);
        counter.record_misses(3);
        counter.record_load_success(Duration::from_millis(10));
        counter.record_load_failure(Duration::from_millis(30));

        let stats = counter.snapshot();
        assert_eq!(stats.hit_count, 2);
        assert_eq!(stats.miss_count, 3);
        assert_eq!(stats.load_success_count, 1);
        assert_eq!(stats.load_failure_count, 1);
        assert_eq!(stats.total_load_time, Duration::from_millis(40));
        assert_eq!(stats.load_count(), 2);
        assert_eq!(stats.load_failure_rate(), 0.5);
        assert_eq!(stats.average_load_penalty(), Duration::from_millis(20));
    }

    #[test]
    fn disabled_counter_stays_zero() {
        let counter = DisabledStatsCounter;
        counter.record_hits(5);
        counter.record_misses(5);
        counter.record_load_success(Duration::from_secs(1));
        assert_eq!(counter.snapshot(), CacheStats::default());
    }

    #[test]
    fn minus_and_plus_are_fieldwise() {
        let a = CacheStats {
            hit_count: 10,
            miss_count: 4,
            load_success_count: 3,
            load_failure_count: 1,
            total_load_time: Duration::from_millis(8),
        };
        let b = CacheStats {
            hit_count: 4,
            miss_count: 6,
            load_success_count: 1,
            load_failure_count: 0,
            total_load_time: Duration::from_millis(2),
        };
        let diff = a.minus(&b);
        assert_eq!(diff.hit_count, 6);
        assert_eq!(diff.miss_count, 0);
        assert_eq!(diff.total_load_time, Duration::from_millis(6));
        assert_eq!(diff.plus(&b).hit_count, a.hit_count);
    }

    #[test]
    fn increment_by_aggregates() {
        let total = ConcurrentStatsCounter::new();
        let part = ConcurrentStatsCounter::new();
        part.record_hits(7);
        part.record_load_failure(Duration::from_micros(5));
        total.increment_by(&part.snapshot());
        total.increment_by(&part.snapshot());
        let stats = total.snapshot();
        assert_eq!(stats.hit_count, 14);
        assert_eq!(stats.load_failure_count, 2);
        assert_eq!(stats.total_load_time, Duration::from_micros(10));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let threads = 8;
        let per_thread = 10_000;
        let counter = Arc::new(ConcurrentStatsCounter::new());
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let counter = counter.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..per_thread {
                        counter.record_hits(1);
                        counter.record_misses(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = counter.snapshot();
        assert_eq!(stats.hit_count, (threads * per_thread) as u64);
        assert_eq!(stats.miss_count, (threads * per_thread) as u64);
    }
}
