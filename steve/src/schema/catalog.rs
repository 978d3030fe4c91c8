//! Converts upstream discovery output into `APISchema` entries and republishes the
//! catalogue as a whole on a coalesced refresh (§4.D).
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use steve_core::discovery::{verbs, ApiGroup, DiscoveredResource};
use steve_core::gvk::{GroupResource, GroupVersionKind, GroupVersionResource};
use steve_core::schema::{ApiSchema, ApiSchemas, Attributes};
use steve_runtime::Debouncer;
use tokio::sync::Semaphore;
use tracing::{instrument, warn};

use super::builtins::builtin_schemas;

/// A legacy group/version identifier redirected to its successor during rebuild.
struct LegacyReplacement {
    from_group: &'static str,
    from_version: &'static str,
    to_group: &'static str,
    to_version: &'static str,
}

/// `extensions/v1beta1` was removed from modern clusters in favour of `apps/v1`; discovery
/// against an old CRD can still report the legacy identifier, so schemas under it are
/// redirected rather than dropped.
const LEGACY_REPLACEMENTS: &[LegacyReplacement] = &[LegacyReplacement {
    from_group: "extensions",
    from_version: "v1beta1",
    to_group: "apps",
    to_version: "v1",
}];

fn apply_legacy_replacement(group: &str, version: &str) -> (String, String) {
    for replacement in LEGACY_REPLACEMENTS {
        if group == replacement.from_group && version == replacement.from_version {
            return (replacement.to_group.to_owned(), replacement.to_version.to_owned());
        }
    }
    (group.to_owned(), version.to_owned())
}

fn schema_from_resource(resource: &DiscoveredResource) -> ApiSchema {
    let (group, version) = apply_legacy_replacement(&resource.group, &resource.version);
    let id = format!("{group}.{version}.{}", resource.kind.to_lowercase());
    let mut schema = ApiSchema::builtin(&id);
    schema.plural_name = resource.plural.clone();
    schema.attributes = Attributes {
        group,
        version,
        kind: resource.kind.clone(),
        resource: resource.plural.clone(),
        verbs: resource.verbs.clone(),
        namespaced: resource.scope.is_namespaced(),
        preferred_group: None,
        preferred_version: None,
        access: Default::default(),
    };
    schema
}

/// Picks, per kind, which discovered resources survive rebuild: list-watchable only, the
/// preferred version when more than one is offered for the same kind, and only those the
/// caller (a self-subject-access-review stand-in) is allowed to list.
fn select_resources(groups: &[ApiGroup], can_list: &dyn Fn(&GroupResource) -> bool) -> Vec<DiscoveredResource> {
    let mut by_kind: HashMap<(String, String), DiscoveredResource> = HashMap::new();

    for group in groups {
        let preferred: std::collections::HashSet<_> = group.recommended_resources().iter().map(|r| &r.kind).collect();
        for resource in group.all_resources() {
            if !resource.is_list_watchable() {
                continue;
            }
            let (replaced_group, _) = apply_legacy_replacement(&resource.group, &resource.version);
            if !can_list(&GroupResource::new(&replaced_group, &resource.plural)) {
                continue;
            }
            let key = (resource.group.clone(), resource.kind.clone());
            match by_kind.get(&key) {
                Some(existing) if preferred.contains(&existing.kind) && !preferred.contains(&resource.kind) => {}
                Some(existing) if !preferred.contains(&resource.kind) && existing.version != resource.version => {
                    // Neither is preferred and we already kept one version; keep the first seen.
                }
                _ => {
                    by_kind.insert(key, resource.clone());
                }
            }
        }
    }

    by_kind.into_values().collect()
}

struct Indexes {
    by_gvr: HashMap<GroupVersionResource, String>,
    by_gvk: HashMap<GroupVersionKind, String>,
}

fn build_indexes(schemas: &ApiSchemas) -> Indexes {
    let mut by_gvr = HashMap::new();
    let mut by_gvk = HashMap::new();
    for schema in schemas.iter() {
        if schema.attributes.resource.is_empty() {
            continue;
        }
        let gvk = schema.attributes.gvk();
        let gvr = GroupVersionResource::gvr(&schema.attributes.group, &schema.attributes.version, &schema.attributes.resource);
        by_gvr.insert(gvr, schema.id.clone());
        by_gvk.insert(gvk, schema.id.clone());
    }
    Indexes { by_gvr, by_gvk }
}

/// The published catalogue: a schema map plus GVR/GVK indexes, swapped atomically on
/// every successful rebuild.
pub struct SchemaCatalog {
    schemas: RwLock<ApiSchemas>,
    indexes: RwLock<Indexes>,
    refresh: Debouncer<()>,
    column_concurrency: Arc<Semaphore>,
}

impl SchemaCatalog {
    /// Function: `pub fn new`.
    pub fn new() -> Self {
        let mut initial = ApiSchemas::new();
        for schema in builtin_schemas() {
            initial.insert(schema);
        }
        let indexes = build_indexes(&initial);
        SchemaCatalog {
            schemas: RwLock::new(initial),
            indexes: RwLock::new(indexes),
            refresh: Debouncer::new(),
            column_concurrency: Arc::new(Semaphore::new(10)),
        }
    }

    /// Method: `pub fn get`.
    pub fn get(&self, id: &str) -> Option<ApiSchema> {
        self.schemas.read().get(id).cloned()
    }

    /// Method: `pub fn find_by_gvr`.
    pub fn find_by_gvr(&self, gvr: &GroupVersionResource) -> Option<ApiSchema> {
        let id = self.indexes.read().by_gvr.get(gvr).cloned()?;
        self.get(&id)
    }

    /// Method: `pub fn find_by_gvk`.
    pub fn find_by_gvk(&self, gvk: &GroupVersionKind) -> Option<ApiSchema> {
        let id = self.indexes.read().by_gvk.get(gvk).cloned()?;
        self.get(&id)
    }

    /// Method: `pub fn snapshot`.
    pub fn snapshot(&self) -> ApiSchemas {
        self.schemas.read().clone()
    }

    /// Mark the catalogue dirty; the coalescing refresh loop started by
    /// [`SchemaCatalog::run_refresh_loop`] rebuilds after its 500ms delay.
    pub fn mark_dirty(&self) {
        self.refresh.publish(());
    }

    /// Replace the published catalogue and its indexes with `schemas` (the `Reset` in
    /// §4.D). Consumers holding the previous `ApiSchemas` snapshot are unaffected: this
    /// swaps the lock's contents, it never mutates a schema a caller already cloned out.
    #[instrument(skip(self, schemas))]
    pub fn reset(&self, mut schemas: ApiSchemas) {
        for schema in builtin_schemas() {
            schemas.insert(schema);
        }
        let indexes = build_indexes(&schemas);
        *self.schemas.write() = schemas;
        *self.indexes.write() = indexes;
    }

    /// Enrich `resources` with custom-column descriptors fetched via `fetch_columns`,
    /// bounded to 10 concurrent calls.
    pub async fn enrich_columns<F, Fut>(&self, resources: Vec<GroupVersionResource>, fetch_columns: F) -> Vec<(GroupVersionResource, Vec<steve_core::schema::Field>)>
    where
        F: Fn(GroupVersionResource) -> Fut,
        Fut: Future<Output = Vec<steve_core::schema::Field>>,
    {
        let mut handles = Vec::new();
        for gvr in resources {
            let permit = Arc::clone(&self.column_concurrency);
            let fields_fut = fetch_columns(gvr.clone());
            handles.push(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore never closed");
                (gvr, fields_fut.await)
            });
        }
        futures::future::join_all(handles).await
    }

    /// Run the catalogue's 500ms coalescing refresh, driving `rebuild` each time a dirty
    /// mark is flushed. Re-marks dirty on failure so the next tick retries.
    pub async fn run_refresh_loop<F>(&self, mut rebuild: F)
    where
        F: FnMut() -> bool,
    {
        self.refresh
            .run(Duration::from_millis(500), |()| {
                if !rebuild() {
                    warn!("schema catalog rebuild failed, will retry next tick");
                    self.mark_dirty();
                }
                true
            })
            .await;
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steve_core::discovery::Scope;

    fn resource(group: &str, version: &str, kind: &str, verbs: &[&str]) -> DiscoveredResource {
        DiscoveredResource {
            group: group.to_owned(),
            version: version.to_owned(),
            kind: kind.to_owned(),
            plural: format!("{}s", kind.to_lowercase()),
            scope: Scope::Namespaced,
            verbs: verbs.iter().map(|v| v.to_string()).collect(),
            shortnames: vec![],
        }
    }

    #[test]
    fn select_resources_drops_non_list_watchable() {
        let groups = vec![ApiGroup {
            name: "apps".to_owned(),
            preferred_version: Some("v1".to_owned()),
            versioned_resources: vec![("v1".to_owned(), vec![resource("apps", "v1", "Deployment", &["get"])])],
        }];
        let kept = select_resources(&groups, &|_| true);
        assert!(kept.is_empty());
    }

    #[test]
    fn select_resources_filters_by_list_permission() {
        let groups = vec![ApiGroup {
            name: "".to_owned(),
            preferred_version: Some("v1".to_owned()),
            versioned_resources: vec![("v1".to_owned(), vec![resource("", "v1", "ConfigMap", &[verbs::LIST, verbs::WATCH])])],
        }];
        let kept = select_resources(&groups, &|_| false);
        assert!(kept.is_empty());
        let kept = select_resources(&groups, &|_| true);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn reset_always_carries_the_builtin_schemas() {
        let catalog = SchemaCatalog::new();
        catalog.reset(ApiSchemas::new());
        assert!(catalog.get("count").is_some());
    }

    #[test]
    fn find_by_gvr_reflects_the_latest_reset() {
        let catalog = SchemaCatalog::new();
        let mut schemas = ApiSchemas::new();
        schemas.insert(schema_from_resource(&resource("", "v1", "ConfigMap", &[verbs::LIST, verbs::WATCH])));
        catalog.reset(schemas);

        let found = catalog.find_by_gvr(&GroupVersionResource::gvr("", "v1", "configmaps"));
        assert!(found.is_some());
    }
}
