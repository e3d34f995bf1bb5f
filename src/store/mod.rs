pub mod hashmap;
pub mod traits;

pub use hashmap::{ConcurrentHashMapStore, ShardedHashMapStore};
pub use traits::{ConcurrentStore, StoreCore, StoreFull, StoreMetrics};
