//! Raw shapes produced by upstream API discovery, before the Schema Catalog (§4.D)
//! enriches them into `APISchema`s.
use crate::gvk::{GroupVersionKind, GroupVersionResource};
use serde::{Deserialize, Serialize};

/// Standard verb names used throughout discovery and access control.
pub mod verbs {
    /// Create a resource.
    pub const CREATE: &str = "create";
    /// Get a single resource.
    pub const GET: &str = "get";
    /// List a collection.
    pub const LIST: &str = "list";
    /// Watch for changes.
    pub const WATCH: &str = "watch";
    /// Delete a single resource.
    pub const DELETE: &str = "delete";
    /// Delete a collection.
    pub const DELETE_COLLECTION: &str = "deletecollection";
    /// Update a resource.
    pub const UPDATE: &str = "update";
    /// Patch a resource.
    pub const PATCH: &str = "patch";

    /// Verbs a schema must carry both of to be list-watchable (§4.D filtering rule).
    pub fn list_watchable(granted: &[String]) -> bool {
        granted.iter().any(|v| v == LIST) && granted.iter().any(|v| v == WATCH)
    }
}

/// Whether a resource kind is namespace-scoped or cluster-scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Lives inside a namespace.
    Namespaced,
    /// Global to the cluster.
    Cluster,
}

impl Scope {
    /// True for [`Scope::Namespaced`].
    pub fn is_namespaced(self) -> bool {
        matches!(self, Scope::Namespaced)
    }
}

/// One resource kind as reported by upstream discovery, before enrichment.
///
/// Grounded on `kube-client::discovery::ApiResource`/`ApiCapabilities`: discovery gives us
/// group/version/kind/plural, the supported verbs, and whether the kind is namespaced, but
/// nothing about RBAC access or custom columns — those are layered on by the Schema Catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscoveredResource {
    /// API group, empty for the core group.
    pub group: String,
    /// API version.
    pub version: String,
    /// PascalCase kind.
    pub kind: String,
    /// Plural resource name.
    pub plural: String,
    /// Whether objects of this kind live in a namespace.
    pub scope: Scope,
    /// Verbs the upstream API reports support for (`get`, `list`, `watch`, ...).
    pub verbs: Vec<String>,
    /// Short names, e.g. `cm` for `configmaps`.
    #[serde(default)]
    pub shortnames: Vec<String>,
}

impl DiscoveredResource {
    /// This resource's group/version/kind identity.
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }

    /// This resource's group/version/resource identity.
    pub fn gvr(&self) -> GroupVersionResource {
        GroupVersionResource::gvr(&self.group, &self.version, &self.plural)
    }

    /// True if this resource supports both `list` and `watch` (§4.D filtering rule).
    pub fn is_list_watchable(&self) -> bool {
        verbs::list_watchable(&self.verbs)
    }
}

/// A group-level discovery result: a group, its preferred version, and the resources
/// found at each served version.
///
/// Mirrors `kube-client::discovery::ApiGroup`'s `recommended_resources` vs
/// `versioned_resources`, which the Schema Catalog's "drop the non-preferred duplicate
/// kind" rule (§4.D) depends on.
#[derive(Debug, Clone, Default)]
pub struct ApiGroup {
    /// Group name, empty for the core group.
    pub name: String,
    /// The group's preferred version, if the upstream server declared one.
    pub preferred_version: Option<String>,
    /// Resources found per served version.
    pub versioned_resources: Vec<(String, Vec<DiscoveredResource>)>,
}

impl ApiGroup {
    /// Resources at the preferred version, or the first served version if none is preferred.
    pub fn recommended_resources(&self) -> &[DiscoveredResource] {
        let version = self
            .preferred_version
            .as_deref()
            .or_else(|| self.versioned_resources.first().map(|(v, _)| v.as_str()));
        version
            .and_then(|v| self.versioned_resources.iter().find(|(rv, _)| rv == v))
            .map(|(_, r)| r.as_slice())
            .unwrap_or_default()
    }

    /// All resources across every served version, each tagged with its version.
    pub fn all_resources(&self) -> impl Iterator<Item = &DiscoveredResource> {
        self.versioned_resources.iter().flat_map(|(_, r)| r.iter())
    }
}
