//! Resolves `user -> AccessSet`, cached by a content hash over the bindings that produced
//! it (§4.B). The hash doubles as the resulting `AccessSet`'s public `id`.
use std::time::Duration;

use sha2::{Digest, Sha256};
use steve_core::access::AccessSet;
use steve_runtime::LruTtlCache;

use super::policy_rule_index::{PolicyRuleIndex, RoleRuleStore, SubjectKind};
use super::role_revision_index::RoleRevisionIndex;

const CACHE_CAPACITY: usize = 50;
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A caller identity: a username plus the groups they belong to.
#[derive(Debug, Clone)]
pub struct UserInfo {
    /// Field: `pub name`.
    pub name: String,
    /// Field: `pub groups`.
    pub groups: Vec<String>,
}

/// Resolves and caches `AccessSet`s for callers, keyed by a hash over the bindings that
/// back each caller's effective permissions rather than over the caller's identity — two
/// users with identical bindings share a cache entry.
pub struct AccessStore {
    user_index: PolicyRuleIndex,
    group_index: PolicyRuleIndex,
    rules: RoleRuleStore,
    revisions: RoleRevisionIndex,
    cache: LruTtlCache<String, AccessSet>,
}

impl AccessStore {
    /// Function: `pub fn new`.
    pub fn new(user_index: PolicyRuleIndex, group_index: PolicyRuleIndex, rules: RoleRuleStore, revisions: RoleRevisionIndex) -> Self {
        debug_assert_eq!(user_index.kind(), SubjectKind::User);
        debug_assert_eq!(group_index.kind(), SubjectKind::Group);
        AccessStore {
            user_index,
            group_index,
            rules,
            revisions,
            cache: LruTtlCache::new(CACHE_CAPACITY, CACHE_TTL),
        }
    }

    /// The content hash identifying `user`'s current effective bindings.
    ///
    /// Bindings are fed into the hash in binding-sort order, and — unlike one path in the
    /// source this is adapted from — the *actual* slice that gets iterated is what's
    /// sorted, so permuting the caller's `groups` input never changes the hash: two
    /// callers with the same subjects in a different order get the same cache key.
    pub fn cache_key(&self, user: &UserInfo) -> String {
        let mut hasher = Sha256::new();

        for binding in self.user_index.matching_cluster_bindings(&user.name) {
            hasher.update(binding.role_name.as_bytes());
            hasher.update([0u8]);
            hasher.update(self.revisions.revision("", &binding.role_name).as_bytes());
            hasher.update([0u8]);
        }
        for binding in self.user_index.matching_role_bindings(&user.name) {
            let role_namespace = if binding.cluster_scoped_role { "" } else { binding.namespace.as_str() };
            hasher.update(binding.role_name.as_bytes());
            hasher.update([0u8]);
            hasher.update(binding.namespace.as_bytes());
            hasher.update([0u8]);
            hasher.update(self.revisions.revision(role_namespace, &binding.role_name).as_bytes());
            hasher.update([0u8]);
        }

        let mut groups = user.groups.clone();
        groups.sort();
        for group in &groups {
            for binding in self.group_index.matching_cluster_bindings(group) {
                hasher.update(binding.role_name.as_bytes());
                hasher.update([0u8]);
                hasher.update(self.revisions.revision("", &binding.role_name).as_bytes());
                hasher.update([0u8]);
            }
            for binding in self.group_index.matching_role_bindings(group) {
                let role_namespace = if binding.cluster_scoped_role { "" } else { binding.namespace.as_str() };
                hasher.update(binding.role_name.as_bytes());
                hasher.update([0u8]);
                hasher.update(binding.namespace.as_bytes());
                hasher.update([0u8]);
                hasher.update(self.revisions.revision(role_namespace, &binding.role_name).as_bytes());
                hasher.update([0u8]);
            }
        }

        hex::encode(hasher.finalize())
    }


    /// Resolve `user`'s effective `AccessSet`, serving from cache when the hash matches.
    pub fn access_for(&self, user: &UserInfo) -> AccessSet {
        let key = self.cache_key(user);
        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let mut set = self.user_index.access_for(&user.name, &self.rules);
        for group in &user.groups {
            set.merge(&self.group_index.access_for(group, &self.rules));
        }
        set.id = key.clone();

        self.cache.insert(key, set.clone());
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accesscontrol::policy_rule_index::{ClusterRoleBinding, RoleBinding};
    use proptest::prelude::*;

    fn store_with_two_groups() -> AccessStore {
        let mut user_index = PolicyRuleIndex::new(SubjectKind::User);
        user_index.add_cluster_role_binding(ClusterRoleBinding {
            name: "alice-view".to_owned(),
            role_name: "view".to_owned(),
            subject_names: vec!["alice".to_owned()],
        });

        let mut group_index = PolicyRuleIndex::new(SubjectKind::Group);
        group_index.add_role_binding(RoleBinding {
            uid: "b-1".to_owned(),
            namespace: "dev".to_owned(),
            role_name: "editor".to_owned(),
            cluster_scoped_role: false,
            subject_names: vec!["developers".to_owned()],
        });
        group_index.add_role_binding(RoleBinding {
            uid: "b-2".to_owned(),
            namespace: "staging".to_owned(),
            role_name: "editor".to_owned(),
            cluster_scoped_role: false,
            subject_names: vec!["stagers".to_owned()],
        });

        let rules = RoleRuleStore::new();
        let revisions = RoleRevisionIndex::new();
        revisions.upsert("", "view", "rev-a");
        AccessStore::new(user_index, group_index, rules, revisions)
    }

    #[test]
    fn cache_key_is_stable_across_a_permutation_of_groups() {
        let store = store_with_two_groups();
        let forward = UserInfo {
            name: "alice".to_owned(),
            groups: vec!["developers".to_owned(), "stagers".to_owned()],
        };
        let reversed = UserInfo {
            name: "alice".to_owned(),
            groups: vec!["stagers".to_owned(), "developers".to_owned()],
        };
        assert_eq!(store.cache_key(&forward), store.cache_key(&reversed));
    }

    #[test]
    fn access_for_populates_the_access_sets_id_from_the_cache_key() {
        let store = store_with_two_groups();
        let user = UserInfo {
            name: "alice".to_owned(),
            groups: vec!["developers".to_owned()],
        };
        let set = store.access_for(&user);
        assert_eq!(set.id, store.cache_key(&user));
    }

    proptest! {
        #[test]
        fn cache_key_is_permutation_invariant_over_group_order(
            mut groups in prop::collection::vec("[a-z]{1,8}", 0..6)
        ) {
            let store = store_with_two_groups();
            let base = UserInfo { name: "alice".to_owned(), groups: groups.clone() };
            let base_key = store.cache_key(&base);

            groups.reverse();
            let reversed = UserInfo { name: "alice".to_owned(), groups };
            prop_assert_eq!(base_key, store.cache_key(&reversed));
        }
    }
}
