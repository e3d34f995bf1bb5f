pub mod exporter;
pub mod snapshot;
pub mod traits;

pub use exporter::PrometheusTextExporter;
pub use snapshot::CacheMetricsSnapshot;
pub use traits::{MetricsExporter, MetricsSnapshotProvider};
