//! # Metrics Traits
//!
//! Snapshotting and export are kept apart from recording: the cache records
//! into its [`StatsCounter`](crate::stats::StatsCounter), a provider turns the
//! counters into a snapshot, and an exporter publishes the snapshot.
//!
//! ```text
//!   LoadingCache ──► MetricsSnapshotProvider<S> ──► S ──► MetricsExporter<S>
//!                      (bench/test, scrape hook)          (production monitoring)
//! ```

/// Produces point-in-time snapshots of type `S`.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Export/publish metrics to production monitoring backends.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
