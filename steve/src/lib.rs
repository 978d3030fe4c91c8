//! RBAC-partitioned Kubernetes-style API aggregator: resolves what a caller can do, projects
//! a personal schema catalogue from it, and proxies dynamic CRUD/watch through an RBAC
//! partitioner so no request ever touches an object the caller wasn't granted (§1, §2).

pub mod accesscontrol;
pub mod counts;
pub mod dispatcher;
pub mod schema;
pub mod store;

pub use accesscontrol::{AccessControl, AccessStore, Authorizer, UserInfo};
pub use counts::{CountsEngine, TrackedKind};
pub use dispatcher::{Dispatcher, DispatchAction, DispatchOutcome};
pub use schema::{SchemaCatalog, SchemaFactory};
pub use store::{partitions_for, ProxyStore, Verb};
