//! `APISchema`/`APISchemas`: the typed description of a resource kind and the catalogue
//! that holds them (§3, §4.D, §4.E).
use crate::access::Access;
use crate::gvk::GroupVersionKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// An HTTP-method-shaped capability a schema may expose on a single object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ResourceMethod {
    /// Variant: `Get`.
    Get,
    /// Variant: `Put`.
    Put,
    /// Variant: `Patch`.
    Patch,
    /// Variant: `Delete`.
    Delete,
}

/// An HTTP-method-shaped capability a schema may expose on its collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum CollectionMethod {
    /// Variant: `Get`.
    Get,
    /// Variant: `Post`.
    Post,
}

/// A named field on a schema, used by formatters and column projection.
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    /// Field: `pub name`.
    pub name: String,
    /// Field: `pub field_type`.
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Field: `pub description`.
    pub description: Option<String>,
}

/// A named custom action a resource or collection exposes via `?action=`.
#[derive(Debug, Clone, Serialize)]
pub struct Action {
    /// Field: `pub name`.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Field: `pub input`.
    pub input: Option<String>,
}

/// group/version/kind/resource, verbs, and the per-verb projected access list a schema
/// carries once projected for a specific user (§3, §4.D, §4.E).
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    /// Field: `pub group`.
    pub group: String,
    /// Field: `pub version`.
    pub version: String,
    /// Field: `pub kind`.
    pub kind: String,
    /// Field: `pub resource`.
    pub resource: String,
    /// Field: `pub verbs`.
    pub verbs: Vec<String>,
    /// Field: `pub namespaced`.
    pub namespaced: bool,
    /// Field: `pub preferred_group`.
    pub preferred_group: Option<String>,
    /// Field: `pub preferred_version`.
    pub preferred_version: Option<String>,
    /// Per-verb access list, populated by the Schema Factory's projection (§4.E); empty on
    /// catalogue (pre-projection) schemas.
    pub access: BTreeMap<String, Vec<Access>>,
}

impl Attributes {
    /// Method: `pub fn gvk`.
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }
}

/// A typed description of one resource kind (§3).
///
/// Immutable after publication: the Schema Catalog publishes these via wholesale `Reset`,
/// and the Schema Factory only ever produces new `APISchema` values by deep-copying and
/// trimming method sets, never by mutating a published one in place.
#[derive(Debug, Clone)]
pub struct ApiSchema {
    /// Field: `pub id`.
    pub id: String,
    /// Field: `pub plural_name`.
    pub plural_name: String,
    /// Field: `pub resource_methods`.
    pub resource_methods: Vec<ResourceMethod>,
    /// Field: `pub collection_methods`.
    pub collection_methods: Vec<CollectionMethod>,
    /// Field: `pub fields`.
    pub fields: Vec<Field>,
    /// Field: `pub actions`.
    pub actions: Vec<Action>,
    /// Field: `pub attributes`.
    pub attributes: Attributes,
}

impl ApiSchema {
    /// A minimal, builtin, non-discovered schema (self-describing types like `schema`,
    /// `error`, `collection`, `subscribe`, `count`, `apiRoot` — §4.E).
    pub fn builtin(id: &str) -> Self {
        ApiSchema {
            id: id.to_string(),
            plural_name: id.to_string(),
            resource_methods: vec![ResourceMethod::Get],
            collection_methods: vec![CollectionMethod::Get],
            fields: Vec::new(),
            actions: Vec::new(),
            attributes: Attributes::default(),
        }
    }

    /// Schemas whose method sets are both empty should be dropped during projection (§4.E).
    pub fn has_no_methods(&self) -> bool {
        self.resource_methods.is_empty() && self.collection_methods.is_empty()
    }
}

/// An ordered mapping `id -> APISchema` plus a shared attributes bag (§3).
///
/// Catalogue-level invariant: every schema referenced by a field's subtype is also present
/// in the catalogue (transitive closure for schema responses). This crate does not enforce
/// that invariant mechanically — it is a contract on whoever populates the catalogue.
#[derive(Debug, Clone, Default)]
pub struct ApiSchemas {
    by_id: BTreeMap<String, ApiSchema>,
}

impl ApiSchemas {
    /// Function: `pub fn new`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Method: `pub fn insert`.
    pub fn insert(&mut self, schema: ApiSchema) {
        self.by_id.insert(schema.id.clone(), schema);
    }

    /// Method: `pub fn get`.
    pub fn get(&self, id: &str) -> Option<&ApiSchema> {
        self.by_id.get(id)
    }

    /// Method: `pub fn remove`.
    pub fn remove(&mut self, id: &str) -> Option<ApiSchema> {
        self.by_id.remove(id)
    }

    /// Lookup by group/version/resource, linear in catalogue size — the catalogue is
    /// rebuilt rarely and read far more often than it's scanned this way, so a dedicated
    /// index is left to callers that need it hot (the Schema Catalog keeps its own
    /// `byGVR`/`byGVK` maps, per §4.D).
    pub fn find_by_gvk(&self, gvk: &GroupVersionKind) -> Option<&ApiSchema> {
        self.by_id.values().find(|s| s.attributes.gvk() == *gvk)
    }

    /// Method: `pub fn iter`.
    pub fn iter(&self) -> impl Iterator<Item = &ApiSchema> {
        self.by_id.values()
    }

    /// Method: `pub fn len`.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Method: `pub fn is_empty`.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_schema_exposes_get_only() {
        let schema = ApiSchema::builtin("schema");
        assert!(!schema.has_no_methods());
        assert_eq!(schema.resource_methods, vec![ResourceMethod::Get]);
    }

    #[test]
    fn schema_with_empty_method_sets_is_flagged_for_removal() {
        let mut schema = ApiSchema::builtin("configmap");
        schema.resource_methods.clear();
        schema.collection_methods.clear();
        assert!(schema.has_no_methods());
    }

    #[test]
    fn catalogue_lookup_by_gvk() {
        let mut catalog = ApiSchemas::new();
        let mut schema = ApiSchema::builtin("configmap");
        schema.attributes.group = "".into();
        schema.attributes.version = "v1".into();
        schema.attributes.kind = "ConfigMap".into();
        catalog.insert(schema);

        let found = catalog.find_by_gvk(&GroupVersionKind::gvk("", "v1", "ConfigMap"));
        assert!(found.is_some());
        assert_eq!(found.unwrap().id, "configmap");
    }
}
