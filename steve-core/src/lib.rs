//! Shared data model for the RBAC-partitioned API aggregator.
//!
//! This crate holds types only: no I/O, no upstream client implementation. Everything
//! here is either a wire shape (`DynamicObject`, `APIObject`, `ApiEvent`), a permission
//! index (`AccessSet`), a schema description (`ApiSchema`), or a named contract another
//! crate fulfills (`UpstreamClient`).

pub mod access;
pub mod apirequest;
pub mod client;
pub mod count;
pub mod discovery;
pub mod dynamic;
pub mod error;
pub mod gvk;
pub mod metadata;
pub mod params;
pub mod partition;
pub mod schema;
pub mod watch;

pub use access::{Access, AccessSet};
pub use apirequest::{ApiObject, ApiObjectList, ApiRequest};
pub use client::UpstreamClient;
pub use count::{Count, ItemCount, Summary};
pub use dynamic::DynamicObject;
pub use error::{ErrorKind, ErrorResponse};
pub use gvk::{GroupResource, GroupVersionKind, GroupVersionResource};
pub use metadata::TypeMeta;
pub use partition::Partition;
pub use schema::{ApiSchema, ApiSchemas};
pub use watch::ApiEvent;

/// Crate-wide result alias; most fallible operations return an [`ErrorKind`].
pub type Result<T, E = ErrorKind> = std::result::Result<T, E>;
