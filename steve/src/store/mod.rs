//! The dynamic proxy surface: RBAC partitioning of a request into shards, and the proxy
//! store that fans those shards out against the upstream client (§4.F-§4.H).

pub mod partitioner;
pub mod proxy;

pub use partitioner::{partitions_for, Verb};
pub use proxy::ProxyStore;
