//! The upstream cluster API client contract (§1): explicitly out of scope to implement,
//! this crate only names the capability surface every store depends on.
use crate::dynamic::DynamicObject;
use crate::error::ErrorKind;
use crate::gvk::GroupVersionResource;
use crate::params::{DeleteOptions, ListParams, Patch, WriteOptions};
use crate::watch::UpstreamEvent;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// One page of a list call: the objects returned plus the merged/continuation metadata
/// the caller needs to request the next page.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Field: `pub items`.
    pub items: Vec<DynamicObject>,
    /// Field: `pub resource_version`.
    pub resource_version: Option<String>,
    /// Field: `pub continue_token`.
    pub continue_token: Option<String>,
}

/// The capability-typed client the store layer is built against (§1: "the core assumes a
/// capability-typed client that can Get/List/Watch/Create/Update/Patch/Delete dynamic
/// resources and list roles and bindings"). Bootstrap, TLS, and auth are out of scope; any
/// implementor satisfying this trait can back the store layer, in-process fakes included.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Method: `async fn get`.
    async fn get(&self, gvr: &GroupVersionResource, namespace: Option<&str>, name: &str) -> Result<DynamicObject, ErrorKind>;

    /// Method: `async fn list`.
    async fn list(&self, gvr: &GroupVersionResource, namespace: Option<&str>, params: &ListParams) -> Result<ListPage, ErrorKind>;

    /// Method: `async fn watch`.
    async fn watch(
        &self,
        gvr: &GroupVersionResource,
        namespace: Option<&str>,
        params: &ListParams,
    ) -> Result<BoxStream<'static, UpstreamEvent>, ErrorKind>;

    /// Method: `async fn create`.
    async fn create(&self, gvr: &GroupVersionResource, namespace: Option<&str>, object: DynamicObject, opts: &WriteOptions) -> Result<DynamicObject, ErrorKind>;

    /// Method: `async fn update`.
    async fn update(
        &self,
        gvr: &GroupVersionResource,
        namespace: Option<&str>,
        name: &str,
        patch: &Patch,
        opts: &WriteOptions,
    ) -> Result<DynamicObject, ErrorKind>;

    /// Method: `async fn delete`.
    async fn delete(
        &self,
        gvr: &GroupVersionResource,
        namespace: Option<&str>,
        name: &str,
        opts: &DeleteOptions,
    ) -> Result<Option<DynamicObject>, ErrorKind>;
}
