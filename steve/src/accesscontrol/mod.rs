//! Access control: resolving "what can this user do" (`AccessStore`, [`PolicyRuleIndex`])
//! and answering "can this user do this" (`Authorizer`, `AccessControl`) (§4.A-§4.C, §4.K.1).

pub mod access_store;
pub mod policy_rule_index;
pub mod role_revision_index;

pub use access_store::{AccessStore, UserInfo};
pub use policy_rule_index::{ClusterRoleBinding, PolicyRuleIndex, RoleBinding, RoleRuleStore, SubjectKind};
pub use role_revision_index::RoleRevisionIndex;

use steve_core::access::AccessSet;
use steve_core::gvk::GroupResource;
use steve_core::schema::ApiSchema;

/// The default, schema-based half of authorisation: whether a verb is even exposed by the
/// projected schema, with no per-object RBAC consulted.
///
/// Implemented as default trait methods so [`AccessControl`] only has to override the one
/// check that needs the live `AccessSet` (`can_do`), falling back to these for everything
/// else and for any builtin schema that has no backing GVK to check grants against.
pub trait Authorizer {
    /// Method: `fn can_get`.
    fn can_get(&self, schema: &ApiSchema) -> bool {
        schema.resource_methods.iter().any(|m| matches!(m, steve_core::schema::ResourceMethod::Get))
    }

    /// Method: `fn can_list`.
    fn can_list(&self, schema: &ApiSchema) -> bool {
        schema
            .collection_methods
            .iter()
            .any(|m| matches!(m, steve_core::schema::CollectionMethod::Get))
    }

    /// Method: `fn can_watch`.
    fn can_watch(&self, schema: &ApiSchema) -> bool {
        self.can_list(schema)
    }

    /// Method: `fn can_create`.
    fn can_create(&self, schema: &ApiSchema) -> bool {
        schema
            .collection_methods
            .iter()
            .any(|m| matches!(m, steve_core::schema::CollectionMethod::Post))
    }

    /// Method: `fn can_update`.
    fn can_update(&self, schema: &ApiSchema) -> bool {
        schema
            .resource_methods
            .iter()
            .any(|m| matches!(m, steve_core::schema::ResourceMethod::Put | steve_core::schema::ResourceMethod::Patch))
    }

    /// Method: `fn can_delete`.
    fn can_delete(&self, schema: &ApiSchema) -> bool {
        schema
            .resource_methods
            .iter()
            .any(|m| matches!(m, steve_core::schema::ResourceMethod::Delete))
    }

    /// Method: `fn can_action`.
    fn can_action(&self, schema: &ApiSchema, action: &str) -> bool {
        schema.actions.iter().any(|a| a.name == action)
    }
}

/// The verb checked against an `AccessSet`, distinct from HTTP method or schema
/// resource-method: this is the RBAC verb (`get`, `list`, `create`, `update`, `delete`,
/// `watch`) that a grant is recorded under.
pub struct AccessControl<'a> {
    /// Field: `pub access_set`.
    pub access_set: &'a AccessSet,
}

impl<'a> Authorizer for AccessControl<'a> {}

impl<'a> AccessControl<'a> {
    /// Function: `pub fn new`.
    pub fn new(access_set: &'a AccessSet) -> Self {
        AccessControl { access_set }
    }

    /// Whether `verb` is allowed on `namespace`/`name` within `schema`.
    ///
    /// Builtin schemas (no group/version/kind) have nothing to check a grant against, so
    /// this falls back to the schema-based method check for them; schemas backed by a real
    /// GVK are additionally gated by the live `AccessSet`.
    pub fn can_do(&self, verb: &str, schema: &ApiSchema, namespace: &str, name: &str) -> bool {
        let gr = GroupResource::new(&schema.attributes.group, &schema.attributes.resource);
        if schema.attributes.resource.is_empty() {
            return self.schema_based_fallback(verb, schema);
        }
        self.access_set.grants(verb, &gr, namespace, name)
    }

    fn schema_based_fallback(&self, verb: &str, schema: &ApiSchema) -> bool {
        match verb {
            "get" => self.can_get(schema),
            "list" => self.can_list(schema),
            "watch" => self.can_watch(schema),
            "create" => self.can_create(schema),
            "update" | "patch" => self.can_update(schema),
            "delete" => self.can_delete(schema),
            _ => false,
        }
    }
}
