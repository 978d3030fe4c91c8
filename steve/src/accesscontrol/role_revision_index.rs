//! Tracks the latest revision token seen for every Role/ClusterRole (§3, §4.C).
//!
//! Revisions are opaque; only equality matters. Cluster-scoped roles are stored under the
//! empty-namespace key, mirroring how `AccessSet` treats cluster-wide grants.
use std::collections::HashMap;

use parking_lot::RwLock;

/// `(namespace, name) -> revision` for every observed Role/ClusterRole.
#[derive(Default)]
pub struct RoleRevisionIndex {
    revisions: RwLock<HashMap<(String, String), String>>,
}

impl RoleRevisionIndex {
    /// Function: `pub fn new`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the revision for a role upserted by the watch feed.
    pub fn upsert(&self, namespace: &str, name: &str, revision: &str) {
        self.revisions
            .write()
            .insert((namespace.to_owned(), name.to_owned()), revision.to_owned());
    }

    /// Method: `pub fn remove`.
    pub fn remove(&self, namespace: &str, name: &str) {
        self.revisions.write().remove(&(namespace.to_owned(), name.to_owned()));
    }

    /// The revision for `(namespace, name)`, or the empty string if never observed.
    ///
    /// An empty-string fallback (rather than `Option`) keeps the hash computation in
    /// `AccessStore::cache_key` simple: a role that briefly disappears from the index still
    /// produces a hashable, if distinguishable, input.
    pub fn revision(&self, namespace: &str, name: &str) -> String {
        self.revisions
            .read()
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_lookup_round_trips() {
        let index = RoleRevisionIndex::new();
        index.upsert("", "admin", "rev-1");
        assert_eq!(index.revision("", "admin"), "rev-1");
    }

    #[test]
    fn missing_entries_resolve_to_empty_string() {
        let index = RoleRevisionIndex::new();
        assert_eq!(index.revision("kube-system", "nope"), "");
    }

    #[test]
    fn remove_clears_the_entry() {
        let index = RoleRevisionIndex::new();
        index.upsert("dev", "editor", "rev-2");
        index.remove("dev", "editor");
        assert_eq!(index.revision("dev", "editor"), "");
    }
}
