//! Per-user schema projection (§4.E): trims a catalogue schema's method sets down to what
//! the caller's `AccessSet` actually grants, caches the result by `AccessSet` id, and
//! notifies subscribers when either the catalogue or the caller's access changes.
use std::time::Duration;

use steve_core::access::AccessSet;
use steve_core::discovery::verbs;
use steve_core::gvk::GroupResource;
use steve_core::schema::{ApiSchema, ApiSchemas, CollectionMethod, ResourceMethod};
use steve_runtime::{Broadcaster, LruTtlCache};

use super::builtins::builtin_schemas;
use super::catalog::SchemaCatalog;

const CACHE_CAPACITY: usize = 50;
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Trim `schema`'s method sets to only what `access` grants for its group/resource,
/// populating `attributes.access` with the per-verb grant list the UI renders from.
///
/// A schema with no backing resource (a builtin) is returned untouched: there is nothing
/// in an `AccessSet` to check it against, and [`super::super::accesscontrol::AccessControl`]
/// already falls back to method-set checks for these.
fn project_one(schema: &ApiSchema, access: &AccessSet) -> Option<ApiSchema> {
    if schema.attributes.resource.is_empty() {
        return Some(schema.clone());
    }

    let gr = GroupResource::new(&schema.attributes.group, &schema.attributes.resource);
    let namespaced = schema.attributes.namespaced;

    // Records for a cluster-scoped schema: a namespace-qualified grant doesn't apply to it,
    // so keep only the ones recorded against the wildcard namespace.
    let records_for = |verb: &str| -> Vec<steve_core::access::Access> {
        let records = access.access_list_for(verb, &gr);
        if namespaced {
            records
        } else {
            records.into_iter().filter(|a| a.namespace == steve_core::access::WILDCARD).collect()
        }
    };

    let mut projected = schema.clone();
    projected.resource_methods = Vec::new();
    projected.collection_methods = Vec::new();

    for verb in [verbs::GET, verbs::LIST, verbs::CREATE, verbs::UPDATE, verbs::PATCH, verbs::DELETE, verbs::WATCH] {
        let list = records_for(verb);
        if !list.is_empty() {
            projected.attributes.access.insert(verb.to_owned(), list);
        }
    }

    if !records_for(verbs::GET).is_empty() {
        projected.resource_methods.push(ResourceMethod::Get);
    }
    if !records_for(verbs::UPDATE).is_empty() || !records_for(verbs::PATCH).is_empty() {
        projected.resource_methods.push(ResourceMethod::Put);
        projected.resource_methods.push(ResourceMethod::Patch);
    }
    if !records_for(verbs::DELETE).is_empty() {
        projected.resource_methods.push(ResourceMethod::Delete);
    }
    if !records_for(verbs::LIST).is_empty() {
        projected.collection_methods.push(CollectionMethod::Get);
    }
    if !records_for(verbs::CREATE).is_empty() {
        projected.collection_methods.push(CollectionMethod::Post);
    }

    // The `namespaces` resource in the empty group gets a synthesised read-only access list
    // from whatever namespaces the user has any permission in, rather than an RBAC grant
    // against `namespaces` itself — GET is exposed even when that synthesised list is empty,
    // so a caller with no visible namespaces can still list zero rather than being 403'd.
    if schema.attributes.group.is_empty() && schema.attributes.resource == "namespaces" && projected.has_no_methods() {
        projected.collection_methods.push(CollectionMethod::Get);
    }

    if projected.has_no_methods() {
        return None;
    }
    Some(projected)
}

/// Project a whole catalogue snapshot for one user's `AccessSet`: trims every discovered
/// schema, drops the ones that end up with no exposed methods, and always keeps the
/// builtins regardless of RBAC.
fn project_all(schemas: &ApiSchemas, access: &AccessSet) -> ApiSchemas {
    let mut out = ApiSchemas::new();
    for builtin in builtin_schemas() {
        out.insert(builtin);
    }
    for schema in schemas.iter() {
        if schema.attributes.resource.is_empty() {
            continue;
        }
        if let Some(projected) = project_one(schema, access) {
            out.insert(projected);
        }
    }
    out
}

/// Produces and caches per-user projected schema catalogues, and republishes a change
/// notification whenever the catalogue resets or a watched caller's `AccessSet` id moves.
pub struct SchemaFactory<'a> {
    catalog: &'a SchemaCatalog,
    projections: LruTtlCache<String, ApiSchemas>,
    changes: Broadcaster<()>,
}

impl<'a> SchemaFactory<'a> {
    /// Function: `pub fn new`.
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        SchemaFactory {
            catalog,
            projections: LruTtlCache::new(CACHE_CAPACITY, CACHE_TTL),
            changes: Broadcaster::new(16),
        }
    }

    /// The projected catalogue for `access`, served from cache when `access.id` is unchanged.
    pub fn project_for(&self, access: &AccessSet) -> ApiSchemas {
        if let Some(cached) = self.projections.get(&access.id) {
            return cached;
        }
        let projected = project_all(&self.catalog.snapshot(), access);
        self.projections.insert(access.id.clone(), projected.clone());
        projected
    }

    /// Drop a cached projection, forcing the next `project_for` call for that `AccessSet`
    /// id to rebuild from the latest catalogue snapshot.
    pub fn invalidate(&self, access_set_id: &str) {
        self.projections.remove(&access_set_id.to_string());
    }

    /// Tell subscribers the projected catalogue for some caller may have changed — the
    /// catalogue reset, or (per caller) the watch-refresh guard noticing the `AccessSet`
    /// id moved.
    pub fn notify_changed(&self) {
        self.changes.publish(());
    }

    /// Method: `pub fn watch_changes`.
    pub fn watch_changes(&self) -> impl futures::Stream<Item = ()> {
        self.changes.subscribe()
    }
}
