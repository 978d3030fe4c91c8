//! The synthetic `count` schema (§4.J): a live tally per watched kind, scanned from the
//! cluster cache and filtered by the caller's `AccessSet`, streamed as coalesced updates.
use std::collections::HashMap;
use std::time::Duration;

use futures::{Stream, StreamExt};
use steve_core::access::AccessSet;
use steve_core::count::{Count, ItemCount, Summary};
use steve_core::dynamic::DynamicObject;
use steve_core::gvk::{GroupResource, GroupVersionKind};
use steve_runtime::{CacheEvent, ClusterCache};
use tokio_util::sync::CancellationToken;

/// One tracked kind: the schema id counts are reported under, its GVK for cache lookup,
/// and the `GroupResource` an `AccessSet` grant is checked against.
#[derive(Debug, Clone)]
pub struct TrackedKind {
    /// Field: `pub schema_id`.
    pub schema_id: String,
    /// Field: `pub gvk`.
    pub gvk: GroupVersionKind,
    /// Field: `pub gr`.
    pub gr: GroupResource,
}

/// Reduce an object's status conditions to a [`Summary`] (§4.J "Summarization"). This
/// crate has no typed status shape to inspect — it reads the conventional `status.conditions`
/// array every controller-managed object tends to set rather than assuming a CRD-specific
/// schema: `Progressing=True` marks transitioning, `Ready=False` or an explicit `error`
/// flag on a condition marks errored.
pub fn summarize(object: &DynamicObject) -> Summary {
    let conditions = object
        .data
        .get("status")
        .and_then(|s| s.get("conditions"))
        .and_then(|c| c.as_array())
        .cloned()
        .unwrap_or_default();

    let transitioning = conditions
        .iter()
        .any(|c| c.get("type").and_then(|t| t.as_str()) == Some("Progressing") && c.get("status").and_then(|s| s.as_str()) == Some("True"));
    let error = conditions.iter().any(|c| {
        c.get("error").and_then(|e| e.as_bool()).unwrap_or(false)
            || (c.get("type").and_then(|t| t.as_str()) == Some("Ready") && c.get("status").and_then(|s| s.as_str()) == Some("False"))
    });
    Summary::new(transitioning, error)
}

fn object_matches_kind(object: &DynamicObject, gvk: &GroupVersionKind) -> bool {
    object
        .types
        .as_ref()
        .map(|t| t.api_version == gvk.api_version() && t.kind == gvk.kind)
        .unwrap_or(false)
}

/// Computes and streams the synthetic `count` object.
pub struct CountsEngine<'a> {
    cache: &'a ClusterCache,
    kinds: Vec<TrackedKind>,
}

impl<'a> CountsEngine<'a> {
    /// Function: `pub fn new`.
    pub fn new(cache: &'a ClusterCache, kinds: Vec<TrackedKind>) -> Self {
        CountsEngine { cache, kinds }
    }

    /// A one-shot tally across every tracked kind, scoped to what `access` grants — the
    /// `count` schema's `List`/`ByID` response (§4.J).
    pub fn snapshot(&self, access: &AccessSet) -> Count {
        let reader = self.cache.reader();
        let mut out = Count::default();
        for kind in &self.kinds {
            let mut tally = ItemCount::default();
            for object in reader.list(&kind.gvk) {
                let namespace = object.namespace().unwrap_or_default();
                if !access.grants("list", &kind.gr, namespace, object.name().unwrap_or_default()) {
                    continue;
                }
                tally.add(namespace, &summarize(&object), object.resource_version_int());
            }
            out.counts.insert(kind.schema_id.clone(), tally);
        }
        out
    }

    /// Subscribe to cluster-cache changes, folding them incrementally into a running
    /// [`Count`] and emitting the whole object on a 1Hz debounced cadence (§4.J). Ends
    /// when `cancellation` fires; any change accumulated since the last tick is discarded
    /// rather than flushed on the way out.
    pub fn watch(&self, access: AccessSet, cancellation: CancellationToken) -> impl Stream<Item = Count> + 'a {
        let mut running = self.snapshot(&access);
        let kinds = self.kinds.clone();
        let mut events = Box::pin(self.cache.watch());
        let mut last_summaries: HashMap<(String, String), Summary> = HashMap::new();

        async_stream::stream! {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.tick().await; // first tick fires immediately; skip it
            let mut dirty = false;
            loop {
                tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => break,
                    event = events.next() => {
                        let Some(event) = event else { break };
                        if apply_event(&mut running, &kinds, &access, &mut last_summaries, event) {
                            dirty = true;
                        }
                    }
                    _ = ticker.tick() => {
                        if dirty {
                            dirty = false;
                            yield running.clone();
                        }
                    }
                }
            }
        }
    }
}

/// Fold one cache event into `running`, returning whether it actually changed anything
/// (the caller uses this to decide whether the next tick has something to flush).
fn apply_event(
    running: &mut Count,
    kinds: &[TrackedKind],
    access: &AccessSet,
    last_summaries: &mut HashMap<(String, String), Summary>,
    event: CacheEvent,
) -> bool {
    let (object, removed) = match event {
        CacheEvent::Add(o) => (o, false),
        CacheEvent::Change(o) => (o, false),
        CacheEvent::Remove(o) => (o, true),
    };
    let Some(kind) = kinds.iter().find(|k| object_matches_kind(&object, &k.gvk)) else {
        return false;
    };
    let namespace = object.namespace().unwrap_or_default().to_owned();
    let name = object.name().unwrap_or_default().to_owned();
    if !access.grants("list", &kind.gr, &namespace, &name) {
        return false;
    }
    let tracking_key = (kind.schema_id.clone(), object.id());
    let tally = running.counts.entry(kind.schema_id.clone()).or_default();

    if removed {
        let previous = last_summaries.remove(&tracking_key);
        let summary = previous.unwrap_or_else(|| summarize(&object));
        tally.remove(&namespace, &summary);
        return true;
    }

    let new_summary = summarize(&object);
    match last_summaries.get(&tracking_key) {
        Some(previous) if !previous.differs_from(&new_summary) => return false,
        Some(previous) => tally.remove(&namespace, previous),
        None => {}
    }
    let changed = tally.add(&namespace, &new_summary, object.resource_version_int());
    last_summaries.insert(tracking_key, new_summary);
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use steve_core::access::Access;
    use steve_core::watch::UpstreamEvent;

    fn configmap_kind() -> TrackedKind {
        TrackedKind {
            schema_id: "configmap".into(),
            gvk: GroupVersionKind::gvk("", "v1", "ConfigMap"),
            gr: GroupResource::new("", "configmaps"),
        }
    }

    #[test]
    fn snapshot_only_counts_objects_the_access_set_grants() {
        let cache = ClusterCache::new(8);
        let writer = cache.writer();
        let gvk = GroupVersionKind::gvk("", "v1", "ConfigMap");
        writer.apply(&gvk, UpstreamEvent::Added(DynamicObject::new("a", "v1", "ConfigMap").within("dev")));
        writer.apply(&gvk, UpstreamEvent::Added(DynamicObject::new("b", "v1", "ConfigMap").within("prod")));

        let mut access = AccessSet::new();
        access.add("list", GroupResource::new("", "configmaps"), Access::new("dev", "*"));

        let engine = CountsEngine::new(&cache, vec![configmap_kind()]);
        let snapshot = engine.snapshot(&access);
        assert_eq!(snapshot.counts.get("configmap").map(|c| c.count), Some(1));
    }

    #[test]
    fn summarize_flags_a_progressing_condition_as_transitioning() {
        let object = DynamicObject::new("a", "v1", "ConfigMap")
            .data(serde_json::json!({"status": {"conditions": [{"type": "Progressing", "status": "True"}]}}));
        let summary = summarize(&object);
        assert!(summary.transitioning);
        assert!(!summary.error);
    }

    #[test]
    fn apply_event_drops_a_change_whose_summary_is_unchanged() {
        let mut running = Count::default();
        let mut last = HashMap::new();
        let kinds = vec![configmap_kind()];
        let access = {
            let mut a = AccessSet::new();
            a.add("list", GroupResource::new("", "configmaps"), Access::cluster_wide());
            a
        };
        let mut object = DynamicObject::new("a", "v1", "ConfigMap").within("dev");
        object.metadata.resource_version = Some("1".into());
        assert!(apply_event(&mut running, &kinds, &access, &mut last, CacheEvent::Add(object.clone())));

        object.metadata.resource_version = Some("2".into());
        assert!(!apply_event(&mut running, &kinds, &access, &mut last, CacheEvent::Change(object)));
    }
}
