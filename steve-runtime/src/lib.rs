//! Generic async mechanics backing the RBAC-partitioned API aggregator.
//!
//! Nothing in this crate knows about schemas, RBAC, or upstream cluster semantics — that
//! business logic lives in `steve`. This crate is the reusable machinery underneath it:
//! caches, coalescing timers, fan-out, and a materialised multi-kind object store.

pub mod broadcast;
pub mod cache;
pub mod cluster_cache;
pub mod debounce;
pub mod lister;
pub mod watch_guard;

pub use broadcast::Broadcaster;
pub use cache::LruTtlCache;
pub use cluster_cache::{CacheEvent, ClusterCache, ClusterCacheReader, ClusterCacheWriter};
pub use debounce::Debouncer;
pub use lister::{MergedList, PartitionLister};
pub use watch_guard::WatchGuard;
