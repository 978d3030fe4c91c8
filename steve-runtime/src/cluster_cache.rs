//! A GVK-indexed materialised view of upstream objects, fed by per-GVK watches (§4.J.1).
//!
//! Mirrors the shape of `kube-runtime::reflector::store`'s `Writer`/`Store` split — a
//! writer that folds watch events into a shared map, and a cheaply cloneable reader handle
//! over the same map — generalised from one typed kind to many GVKs sharing a single map,
//! and with add/change/remove fanned out through [`crate::broadcast::Broadcaster`] instead
//! of returned to the caller.
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use steve_core::dynamic::DynamicObject;
use steve_core::gvk::GroupVersionKind;
use steve_core::watch::UpstreamEvent;

use crate::broadcast::Broadcaster;

/// Identifies a single cached object across all watched kinds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    gvk: GroupVersionKind,
    namespace: Option<String>,
    name: String,
}

impl CacheKey {
    fn of(gvk: &GroupVersionKind, object: &DynamicObject) -> Self {
        CacheKey {
            gvk: gvk.clone(),
            namespace: object.namespace().map(str::to_owned),
            name: object.name().unwrap_or_default().to_owned(),
        }
    }
}

/// A notification the cache emits whenever its contents change.
#[derive(Clone, Debug)]
pub enum CacheEvent {
    /// Variant: `Add`.
    Add(DynamicObject),
    /// Variant: `Change`.
    Change(DynamicObject),
    /// Variant: `Remove`.
    Remove(DynamicObject),
}

type Table = HashMap<CacheKey, DynamicObject>;

/// The write side of a cluster cache. Owned by the watch loop that feeds it; callers that
/// only need to read go through [`ClusterCache::reader`].
pub struct ClusterCacheWriter {
    table: Arc<RwLock<Table>>,
    events: Arc<Broadcaster<CacheEvent>>,
}

impl ClusterCacheWriter {
    /// Fold one upstream watch event into the cache, emitting the matching [`CacheEvent`].
    ///
    /// `Error` events carry no object and are dropped here; the watch loop that produced
    /// them is responsible for surfacing the failure to its own caller.
    pub fn apply(&self, gvk: &GroupVersionKind, event: UpstreamEvent) {
        match event {
            UpstreamEvent::Added(object) => {
                let key = CacheKey::of(gvk, &object);
                self.table.write().insert(key, object.clone());
                self.events.publish(CacheEvent::Add(object));
            }
            UpstreamEvent::Modified(object) => {
                let key = CacheKey::of(gvk, &object);
                self.table.write().insert(key, object.clone());
                self.events.publish(CacheEvent::Change(object));
            }
            UpstreamEvent::Deleted(object) => {
                let key = CacheKey::of(gvk, &object);
                self.table.write().remove(&key);
                self.events.publish(CacheEvent::Remove(object));
            }
            UpstreamEvent::Error(_) => {}
        }
    }

    /// Replace every object of `gvk` with `objects`, diffing against the current contents
    /// so callers still watching for removals see them, rather than a naive clear-then-fill
    /// that would transiently report everything as gone.
    pub fn replace(&self, gvk: &GroupVersionKind, objects: Vec<DynamicObject>) {
        let fresh: Table = objects
            .into_iter()
            .map(|object| (CacheKey::of(gvk, &object), object))
            .collect();

        let mut removed = Vec::new();
        {
            let mut table = self.table.write();
            table.retain(|key, object| {
                if &key.gvk != gvk {
                    return true;
                }
                if fresh.contains_key(key) {
                    true
                } else {
                    removed.push(object.clone());
                    false
                }
            });
            for (key, object) in &fresh {
                table.insert(key.clone(), object.clone());
            }
        }

        for object in removed {
            self.events.publish(CacheEvent::Remove(object));
        }
        for object in fresh.into_values() {
            self.events.publish(CacheEvent::Change(object));
        }
    }
}

/// A cheaply cloneable read handle over a [`ClusterCache`]'s shared table.
#[derive(Clone)]
pub struct ClusterCacheReader {
    table: Arc<RwLock<Table>>,
}

impl ClusterCacheReader {
    /// All cached objects of one kind, in no particular order.
    pub fn list(&self, gvk: &GroupVersionKind) -> Vec<DynamicObject> {
        self.table
            .read()
            .iter()
            .filter(|(key, _)| &key.gvk == gvk)
            .map(|(_, object)| object.clone())
            .collect()
    }

    /// A single object by kind, namespace, and name.
    pub fn get(&self, gvk: &GroupVersionKind, namespace: Option<&str>, name: &str) -> Option<DynamicObject> {
        let key = CacheKey {
            gvk: gvk.clone(),
            namespace: namespace.map(str::to_owned),
            name: name.to_owned(),
        };
        self.table.read().get(&key).cloned()
    }
}

/// A multi-GVK materialised view, owning both the writer and the change-notification bus.
pub struct ClusterCache {
    table: Arc<RwLock<Table>>,
    events: Arc<Broadcaster<CacheEvent>>,
}

impl ClusterCache {
    /// Function: `pub fn new`.
    pub fn new(bus_capacity: usize) -> Self {
        ClusterCache {
            table: Arc::new(RwLock::new(HashMap::new())),
            events: Arc::new(Broadcaster::new(bus_capacity)),
        }
    }

    /// Method: `pub fn writer`.
    pub fn writer(&self) -> ClusterCacheWriter {
        ClusterCacheWriter {
            table: Arc::clone(&self.table),
            events: Arc::clone(&self.events),
        }
    }

    /// Method: `pub fn reader`.
    pub fn reader(&self) -> ClusterCacheReader {
        ClusterCacheReader {
            table: Arc::clone(&self.table),
        }
    }

    /// Subscribe to add/change/remove notifications across every kind in the cache.
    pub fn watch(&self) -> impl futures::Stream<Item = CacheEvent> {
        self.events.subscribe()
    }
}
