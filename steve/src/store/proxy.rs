//! Presents dynamic CRUD and watch to the dispatcher, delegating to an [`UpstreamClient`]
//! and fanning list/watch out across the RBAC Partitioner's shards (§4.H).
use std::collections::HashSet;
use std::sync::Arc;

use async_stream::stream;
use futures::stream::{select_all, BoxStream, StreamExt};
use steve_core::access::WILDCARD;
use steve_core::client::{ListPage, UpstreamClient};
use steve_core::dynamic::DynamicObject;
use steve_core::error::ErrorKind;
use steve_core::gvk::GroupVersionResource;
use steve_core::params::{DeleteOptions, ListParams, Patch, WriteOptions};
use steve_core::partition::{NameSelector, Partition};
use steve_core::schema::ApiSchema;
use steve_core::watch::UpstreamEvent;
use steve_runtime::PartitionLister;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Default fan-out width for a partitioned list or watch (§4.G).
const DEFAULT_CONCURRENCY: usize = 3;

fn partition_namespace(partition: &Partition) -> Option<String> {
    let ns = partition.namespace();
    if ns.is_empty() {
        None
    } else {
        Some(ns.to_owned())
    }
}

/// If `object`'s upstream kind is `Table` (`meta.k8s.io/v1`, `v1beta1`), unwrap its rows
/// into plain objects, stuffing each row's `cells` into a top-level `fields` key (§4.H).
/// Any other kind passes through as a single-element list.
fn unwrap_table(object: DynamicObject) -> Vec<DynamicObject> {
    let is_table = object.types.as_ref().map(|t| t.kind == "Table").unwrap_or(false);
    if !is_table {
        return vec![object];
    }
    let Some(rows) = object.data.get("rows").and_then(|v| v.as_array()).cloned() else {
        return vec![object];
    };
    rows.into_iter()
        .filter_map(|row| {
            let cells = row.get("cells").cloned().unwrap_or(serde_json::Value::Array(vec![]));
            let mut inner = row.get("object").cloned()?;
            if let serde_json::Value::Object(map) = &mut inner {
                map.insert("fields".to_string(), cells);
            }
            serde_json::from_value::<DynamicObject>(inner).ok()
        })
        .collect()
}

/// A single-row Table collapses to the bare object (§4.H); a non-Table object passes
/// through untouched.
fn unwrap_table_single(object: DynamicObject) -> DynamicObject {
    let mut rows = unwrap_table(object.clone());
    if rows.len() == 1 {
        rows.pop().expect("checked len == 1")
    } else {
        object
    }
}

fn name_filter(names: &NameSelector) -> Option<HashSet<String>> {
    match names {
        NameSelector::All => None,
        NameSelector::Names(names) => Some(names.iter().cloned().collect()),
    }
}

fn filtered_watch_stream(upstream: BoxStream<'static, UpstreamEvent>, names: NameSelector) -> BoxStream<'static, UpstreamEvent> {
    let Some(allowed) = name_filter(&names) else {
        return upstream;
    };
    upstream
        .filter(move |event| {
            let keep = event.object().and_then(|o| o.name()).map(|n| allowed.contains(n)).unwrap_or(true);
            futures::future::ready(keep)
        })
        .boxed()
}

fn cancellable(source: BoxStream<'static, UpstreamEvent>, cancellation: CancellationToken) -> BoxStream<'static, UpstreamEvent> {
    Box::pin(stream! {
        tokio::pin!(source);
        loop {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                next = source.next() => match next {
                    Some(event) => yield event,
                    None => break,
                },
            }
        }
    })
}

/// The dynamic CRUD + watch surface backing every discovered schema, generic over the
/// `UpstreamClient` it proxies to.
pub struct ProxyStore<C> {
    client: Arc<C>,
}

impl<C> ProxyStore<C>
where
    C: UpstreamClient + 'static,
{
    /// Function: `pub fn new`.
    pub fn new(client: Arc<C>) -> Self {
        ProxyStore { client }
    }

    #[instrument(skip(self))]
    /// Method: `pub async fn get`.
    pub async fn get(&self, gvr: &GroupVersionResource, namespace: Option<&str>, name: &str) -> Result<DynamicObject, ErrorKind> {
        let object = self.client.get(gvr, namespace, name).await?;
        Ok(unwrap_table_single(object))
    }

    /// List across `partitions`, bounded to `DEFAULT_CONCURRENCY` concurrent upstream calls,
    /// each rewriting `params`' continue/revision/limit for its own shard (§4.G).
    pub async fn list(&self, gvr: &GroupVersionResource, partitions: Vec<Partition>, params: &ListParams) -> Result<steve_runtime::MergedList, ErrorKind> {
        let client = Arc::clone(&self.client);
        let base = params.clone();
        let gvr = gvr.clone();
        let lister = PartitionLister::new(partitions, DEFAULT_CONCURRENCY, move |partition, cont, revision, limit| {
            let client = Arc::clone(&client);
            let gvr = gvr.clone();
            let mut params = base.clone();
            params.continue_token = cont;
            params.resource_version = revision;
            params.limit = limit;
            async move {
                let namespace = partition_namespace(&partition);
                let mut page = client.list(&gvr, namespace.as_deref(), &params).await?;
                if let Partition::Scoped { names, .. } = &partition {
                    if let Some(allowed) = name_filter(names) {
                        page.items.retain(|o| o.name().map(|n| allowed.contains(n)).unwrap_or(false));
                    }
                }
                page.items = page.items.into_iter().flat_map(unwrap_table).collect();
                Ok::<ListPage, ErrorKind>(page)
            }
        });
        lister.list(params.resource_version.clone(), params.limit, params.continue_token.as_deref()).await
    }

    /// List a single namespace filtered to `names`, rejecting the wildcard namespace rather
    /// than scanning globally (§4.H "ByNames").
    pub async fn list_names(&self, gvr: &GroupVersionResource, namespace: &str, names: &[String], params: &ListParams) -> Result<ListPage, ErrorKind> {
        if namespace == WILDCARD {
            return Ok(ListPage::default());
        }
        let allowed: HashSet<&str> = names.iter().map(String::as_str).collect();
        let mut page = self.client.list(gvr, Some(namespace), params).await?;
        page.items.retain(|o| o.name().map(|n| allowed.contains(n)).unwrap_or(false));
        Ok(page)
    }

    #[instrument(skip(self, object))]
    /// Method: `pub async fn create`.
    pub async fn create(&self, schema: &ApiSchema, namespace: Option<&str>, mut object: DynamicObject, opts: &WriteOptions) -> Result<DynamicObject, ErrorKind> {
        if object.name().is_none() && object.metadata.generate_name.is_none() {
            let prefix = schema.id.chars().next().unwrap_or('o');
            object.metadata.generate_name = Some(format!("{prefix}-"));
        }
        if object.namespace().is_none() {
            if let Some(ns) = namespace {
                object = object.within(ns);
            }
        }
        object.types = Some(steve_core::metadata::TypeMeta {
            api_version: schema.attributes.gvk().api_version(),
            kind: schema.attributes.kind.clone(),
        });
        let gvr = GroupVersionResource::gvr(&schema.attributes.group, &schema.attributes.version, &schema.attributes.resource);
        let created = self.client.create(&gvr, namespace, object, opts).await?;
        Ok(unwrap_table_single(created))
    }

    /// Method: `pub async fn update`.
    pub async fn update(&self, gvr: &GroupVersionResource, namespace: Option<&str>, name: &str, patch: &Patch, opts: &WriteOptions) -> Result<DynamicObject, ErrorKind> {
        patch.validate()?;
        let updated = self.client.update(gvr, namespace, name, patch, opts).await?;
        Ok(unwrap_table_single(updated))
    }

    /// Delete, then attempt a follow-up read when the upstream didn't hand back the
    /// post-delete body (e.g. a finalizer is still draining); `None` means the object is
    /// fully gone and the dispatcher should report a bodyless 204 (§4.H).
    pub async fn delete(&self, gvr: &GroupVersionResource, namespace: Option<&str>, name: &str, opts: &DeleteOptions) -> Result<Option<DynamicObject>, ErrorKind> {
        if let Some(object) = self.client.delete(gvr, namespace, name, opts).await? {
            return Ok(Some(object));
        }
        match self.client.get(gvr, namespace, name).await {
            Ok(object) => Ok(Some(unwrap_table_single(object))),
            Err(_) => Ok(None),
        }
    }

    /// Watch across `partitions`, merging arrival-interleaved (§5 "Ordering"). Cancelling
    /// `cancellation` tears down every child watch and closes the merged stream exactly
    /// once (§4.H, §5).
    pub async fn watch(
        &self,
        gvr: &GroupVersionResource,
        partitions: Vec<Partition>,
        params: &ListParams,
        cancellation: CancellationToken,
    ) -> Result<BoxStream<'static, UpstreamEvent>, ErrorKind> {
        let mut children = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let namespace = partition_namespace(&partition);
            let upstream = self.client.watch(gvr, namespace.as_deref(), params).await?;
            let names = match &partition {
                Partition::Scoped { names, .. } => names.clone(),
                Partition::Passthrough => NameSelector::All,
            };
            children.push(filtered_watch_stream(upstream, names));
        }
        Ok(cancellable(Box::pin(select_all(children)), cancellation))
    }

    /// Watch a single namespace filtered to `names`, rejecting the wildcard namespace
    /// (§4.H "WatchNames").
    pub async fn watch_names(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        names: Vec<String>,
        params: &ListParams,
        cancellation: CancellationToken,
    ) -> Result<BoxStream<'static, UpstreamEvent>, ErrorKind> {
        if namespace == WILDCARD {
            return Ok(Box::pin(futures::stream::empty()));
        }
        let upstream = self.client.watch(gvr, Some(namespace), params).await?;
        let filtered = filtered_watch_stream(upstream, NameSelector::Names(names));
        Ok(cancellable(filtered, cancellation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use steve_core::watch::UpstreamEvent;
    use tokio::sync::Mutex as AsyncMutex;

    struct FakeClient {
        objects: AsyncMutex<Vec<DynamicObject>>,
    }

    #[async_trait]
    impl UpstreamClient for FakeClient {
        async fn get(&self, _gvr: &GroupVersionResource, _namespace: Option<&str>, name: &str) -> Result<DynamicObject, ErrorKind> {
            self.objects
                .lock()
                .await
                .iter()
                .find(|o| o.name() == Some(name))
                .cloned()
                .ok_or_else(|| ErrorKind::not_found(name))
        }

        async fn list(&self, _gvr: &GroupVersionResource, namespace: Option<&str>, _params: &ListParams) -> Result<ListPage, ErrorKind> {
            let items = self
                .objects
                .lock()
                .await
                .iter()
                .filter(|o| namespace.is_none() || o.namespace() == namespace)
                .cloned()
                .collect();
            Ok(ListPage { items, resource_version: Some("1".into()), continue_token: None })
        }

        async fn watch(
            &self,
            _gvr: &GroupVersionResource,
            _namespace: Option<&str>,
            _params: &ListParams,
        ) -> Result<BoxStream<'static, UpstreamEvent>, ErrorKind> {
            Ok(futures::stream::empty().boxed())
        }

        async fn create(&self, _gvr: &GroupVersionResource, _namespace: Option<&str>, object: DynamicObject, _opts: &WriteOptions) -> Result<DynamicObject, ErrorKind> {
            self.objects.lock().await.push(object.clone());
            Ok(object)
        }

        async fn update(&self, _gvr: &GroupVersionResource, _namespace: Option<&str>, _name: &str, patch: &Patch, _opts: &WriteOptions) -> Result<DynamicObject, ErrorKind> {
            Ok(DynamicObject::new("updated", "v1", "ConfigMap").data(patch.body().clone()))
        }

        async fn delete(&self, _gvr: &GroupVersionResource, _namespace: Option<&str>, _name: &str, _opts: &DeleteOptions) -> Result<Option<DynamicObject>, ErrorKind> {
            Ok(None)
        }
    }

    fn gvr() -> GroupVersionResource {
        GroupVersionResource::gvr("", "v1", "configmaps")
    }

    #[test]
    fn unwrap_table_flattens_rows_with_cells_into_fields() {
        let mut table = DynamicObject::new("ignored", "meta.k8s.io/v1", "Table");
        table.data = json!({
            "rows": [
                {"cells": ["a", "1"], "object": {"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}}},
                {"cells": ["b", "2"], "object": {"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "b"}}},
            ]
        });
        let rows = unwrap_table(table);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].data.get("fields").unwrap(), &json!(["a", "1"]));
    }

    #[test]
    fn single_row_table_collapses_to_the_bare_object() {
        let mut table = DynamicObject::new("ignored", "meta.k8s.io/v1", "Table");
        table.data = json!({
            "rows": [{"cells": ["a"], "object": {"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}}}]
        });
        let single = unwrap_table_single(table);
        assert_eq!(single.name(), Some("a"));
    }

    #[tokio::test]
    async fn list_names_rejects_the_wildcard_namespace() {
        let client = Arc::new(FakeClient { objects: AsyncMutex::new(vec![]) });
        let store = ProxyStore::new(client);
        let page = store.list_names(&gvr(), WILDCARD, &["a".into()], &ListParams::default()).await.unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn list_names_drops_objects_outside_the_set() {
        let objects = vec![
            DynamicObject::new("a", "v1", "ConfigMap").within("dev"),
            DynamicObject::new("b", "v1", "ConfigMap").within("dev"),
        ];
        let client = Arc::new(FakeClient { objects: AsyncMutex::new(objects) });
        let store = ProxyStore::new(client);
        let page = store.list_names(&gvr(), "dev", &["a".to_string()], &ListParams::default()).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name(), Some("a"));
    }

    #[tokio::test]
    async fn create_assigns_a_generated_name_from_the_schema_id() {
        let client = Arc::new(FakeClient { objects: AsyncMutex::new(vec![]) });
        let store = ProxyStore::new(client);
        let schema = {
            let mut s = ApiSchema::builtin("configmap");
            s.attributes.group = "".into();
            s.attributes.version = "v1".into();
            s.attributes.kind = "ConfigMap".into();
            s.attributes.resource = "configmaps".into();
            s
        };
        let object = DynamicObject::new("", "v1", "ConfigMap").data(json!({}));
        let mut object = object;
        object.metadata.name = None;
        let created = store.create(&schema, Some("dev"), object, &WriteOptions::default()).await.unwrap();
        assert_eq!(created.metadata.generate_name.as_deref(), Some("c-"));
        assert_eq!(created.namespace(), Some("dev"));
    }

    #[tokio::test]
    async fn delete_falls_back_to_a_get_when_no_body_is_returned() {
        let objects = vec![DynamicObject::new("a", "v1", "ConfigMap").within("dev")];
        let client = Arc::new(FakeClient { objects: AsyncMutex::new(objects) });
        let store = ProxyStore::new(client);
        let deleted = store.delete(&gvr(), Some("dev"), "a", &DeleteOptions::default()).await.unwrap();
        assert!(deleted.is_some());
    }
}
