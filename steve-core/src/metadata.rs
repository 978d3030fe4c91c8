//! Metadata structs flattened into dynamic objects and list wrappers.
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ListMeta, ObjectMeta};
use serde::{Deserialize, Serialize};

/// `apiVersion`/`kind`, flattened into every upstream object.
#[derive(Deserialize, Serialize, Clone, Default, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    /// `group/version`, or bare `version` for the core group.
    pub api_version: String,
    /// PascalCase kind.
    pub kind: String,
}

/// Reads the resource's upstream identifier, `namespace/name` for namespaced objects or
/// bare `name` otherwise — the rule `APIObject::id` follows on the wire.
pub fn object_id(meta: &ObjectMeta) -> String {
    match (&meta.namespace, &meta.name) {
        (Some(ns), Some(name)) if !ns.is_empty() => format!("{ns}/{name}"),
        (_, Some(name)) => name.clone(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_is_namespace_slash_name_when_namespaced() {
        let meta = ObjectMeta {
            namespace: Some("dev".into()),
            name: Some("my-cm".into()),
            ..Default::default()
        };
        assert_eq!(object_id(&meta), "dev/my-cm");
    }

    #[test]
    fn object_id_is_bare_name_when_cluster_scoped() {
        let meta = ObjectMeta {
            name: Some("my-node".into()),
            ..Default::default()
        };
        assert_eq!(object_id(&meta), "my-node");
    }
}
