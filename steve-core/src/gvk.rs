//! Group/version/kind/resource identifiers for dynamic resources.
use std::str::FromStr;

use crate::TypeMeta;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to parse group version: {0}")]
/// Failed to parse a `group/version` string.
pub struct ParseGroupVersionError(pub String);

/// Core information about an API resource kind.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersionKind {
    /// API group, empty for the core group.
    pub group: String,
    /// API version.
    pub version: String,
    /// PascalCase kind.
    pub kind: String,
}

impl GroupVersionKind {
    /// Construct from explicit group, version, and kind.
    pub fn gvk(group: &str, version: &str, kind: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    /// The `apiVersion` string used on the wire (`group/version`, or bare `version` for the core group).
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Drop the kind, keeping only group+version.
    pub fn group_version(&self) -> GroupVersion {
        GroupVersion::gv(&self.group, &self.version)
    }
}

impl TryFrom<&TypeMeta> for GroupVersionKind {
    type Error = ParseGroupVersionError;

    fn try_from(tm: &TypeMeta) -> Result<Self, Self::Error> {
        Ok(GroupVersion::from_str(&tm.api_version)?.with_kind(&tm.kind))
    }
}
impl TryFrom<TypeMeta> for GroupVersionKind {
    type Error = ParseGroupVersionError;

    fn try_from(tm: TypeMeta) -> Result<Self, Self::Error> {
        Ok(GroupVersion::from_str(&tm.api_version)?.with_kind(&tm.kind))
    }
}

/// A group and version, without a kind.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersion {
    /// API group, empty for the core group.
    pub group: String,
    /// API version.
    pub version: String,
}

impl GroupVersion {
    /// Construct from explicit group and version.
    pub fn gv(group: &str, version: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
        }
    }

    /// Upgrade to a [`GroupVersionKind`].
    pub fn with_kind(self, kind: &str) -> GroupVersionKind {
        GroupVersionKind {
            group: self.group,
            version: self.version,
            kind: kind.into(),
        }
    }

    /// The `apiVersion` string used on the wire.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl FromStr for GroupVersion {
    type Err = ParseGroupVersionError;

    /// Parses `apiVersion` strings as Kubernetes does: a bare version belongs to the core
    /// group, anything with a slash splits into `group/version` on the first occurrence
    /// (a version itself never contains one). More than one slash is rejected rather than
    /// silently keeping only the first two segments.
    fn from_str(gv: &str) -> Result<Self, Self::Err> {
        if gv.is_empty() {
            return Err(ParseGroupVersionError(gv.into()));
        }
        match gv.find('/') {
            None => Ok(Self { group: String::new(), version: gv.to_owned() }),
            Some(at) if gv[at + 1..].contains('/') => Err(ParseGroupVersionError(gv.into())),
            Some(at) => Ok(Self { group: gv[..at].to_owned(), version: gv[at + 1..].to_owned() }),
        }
    }
}

/// Identifies a resource type (group + plural resource name) independent of version.
///
/// This is the granularity `AccessSet` indexes on: a grant is scoped to
/// `(verb, GroupResource)`, not to a specific version, mirroring how RBAC `PolicyRule`s
/// name `apiGroups`/`resources` without a version component.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupResource {
    /// API group, empty for the core group.
    pub group: String,
    /// Plural resource name, e.g. `configmaps`.
    pub resource: String,
}

impl GroupResource {
    /// Construct from explicit group and resource.
    pub fn new(group: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            resource: resource.to_string(),
        }
    }

    /// The sentinel `{"*", "*"}` group-resource used for cluster-wide wildcard grants.
    pub fn wildcard() -> Self {
        Self::new("*", "*")
    }
}

/// A type-erased group/version/resource identifier.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersionResource {
    /// API group, empty for the core group.
    pub group: String,
    /// API version.
    pub version: String,
    /// Plural resource name.
    pub resource: String,
}

impl GroupVersionResource {
    /// Construct from explicit group, version, and plural resource name.
    pub fn gvr(group: &str, version: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
        }
    }

    /// Drop the version, keeping only group+resource.
    pub fn group_resource(&self) -> GroupResource {
        GroupResource::new(&self.group, &self.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gvk_from_type_meta() {
        let tm = TypeMeta {
            api_version: "kube.rs/v1".into(),
            kind: "Example".into(),
        };
        let gvk = GroupVersionKind::try_from(&tm).unwrap();
        assert_eq!(gvk, GroupVersionKind::gvk("kube.rs", "v1", "Example"));
    }

    #[test]
    fn api_version_core_group_is_bare_version() {
        let gvk = GroupVersionKind::gvk("", "v1", "ConfigMap");
        assert_eq!(gvk.api_version(), "v1");
    }

    #[test]
    fn api_version_named_group_is_slash_joined() {
        let gvk = GroupVersionKind::gvk("apps", "v1", "Deployment");
        assert_eq!(gvk.api_version(), "apps/v1");
    }

    #[test]
    fn group_version_parse_roundtrips_api_version() {
        let gv: GroupVersion = "rbac.authorization.k8s.io/v1".parse().unwrap();
        assert_eq!(gv, GroupVersion::gv("rbac.authorization.k8s.io", "v1"));
        let core: GroupVersion = "v1".parse().unwrap();
        assert_eq!(core, GroupVersion::gv("", "v1"));
    }

    #[test]
    fn group_resource_wildcard_matches_cluster_wide_sentinel() {
        let wc = GroupResource::wildcard();
        assert_eq!(wc.group, "*");
        assert_eq!(wc.resource, "*");
    }
}
