//! An untyped representation of a single kubernetes-shaped object.
//!
//! Everything this crate proxies is schemaless JSON with `apiVersion`/`kind` attached;
//! `DynamicObject` is the one type every store, formatter, and dispatcher path passes
//! around instead of a family of generated per-kind structs (§9, "Dynamic schemas over
//! untyped payloads").

use crate::metadata::{object_id, TypeMeta};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// A dynamic representation of a single kubernetes object: type info, metadata, and
/// whatever else the upstream API returned, flattened into one JSON value.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct DynamicObject {
    /// `apiVersion`/`kind`, not always present (e.g. on watch bookmarks).
    #[serde(flatten, default)]
    pub types: Option<TypeMeta>,
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Everything else: `spec`, `status`, and any non-reserved top-level keys.
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl DynamicObject {
    /// Construct a minimal object with just a name and `apiVersion`/`kind` set.
    #[must_use]
    pub fn new(name: &str, api_version: &str, kind: &str) -> Self {
        Self {
            types: Some(TypeMeta {
                api_version: api_version.to_string(),
                kind: kind.to_string(),
            }),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            data: serde_json::Value::Null,
        }
    }

    /// Attach a namespace.
    #[must_use]
    pub fn within(mut self, ns: &str) -> Self {
        self.metadata.namespace = Some(ns.into());
        self
    }

    /// Attach a spec/status payload.
    #[must_use]
    pub fn data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// The upstream object's name, if set.
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    /// The upstream object's namespace, if set.
    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    /// The transport `id` this object maps to: `namespace/name` or bare `name` (§3).
    pub fn id(&self) -> String {
        object_id(&self.metadata)
    }

    /// The object's `resourceVersion`, parsed as an integer for revision-comparisons.
    ///
    /// Returns `None` when absent or non-numeric — callers treat that as "no ordering
    /// information available" rather than a hard failure.
    pub fn resource_version_int(&self) -> Option<u64> {
        self.metadata.resource_version.as_ref()?.parse().ok()
    }
}
