//! Per-subject-kind binding index (§4.B.1): given a subject name, find every cluster-role
//! binding or role-binding naming it and expand the referenced role's rules into grants.
//!
//! `AccessStore` owns one [`PolicyRuleIndex`] for users and one for groups, merging the
//! user's own entry with one entry per group the user belongs to.
use std::collections::HashMap;

use steve_core::access::{Access, AccessSet, PolicyRule};

/// Which half of a Kubernetes `Subject` this index resolves: the user's own name, or one
/// of their group memberships. Purely a documentation/API-clarity marker — both kinds are
/// matched the same way, against whichever subject name the caller passes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectKind {
    /// Variant: `User`.
    User,
    /// Variant: `Group`.
    Group,
}

/// A cluster-scoped binding: `role_name` names a `ClusterRole`.
#[derive(Debug, Clone)]
pub struct ClusterRoleBinding {
    /// Field: `pub name`.
    pub name: String,
    /// Field: `pub role_name`.
    pub role_name: String,
    /// Field: `pub subject_names`.
    pub subject_names: Vec<String>,
}

/// A namespaced binding: `role_name` names either a `Role` in `namespace` or, when
/// `cluster_scoped_role` is set, a `ClusterRole` used namespace-scoped.
#[derive(Debug, Clone)]
pub struct RoleBinding {
    /// Field: `pub uid`.
    pub uid: String,
    /// Field: `pub namespace`.
    pub namespace: String,
    /// Field: `pub role_name`.
    pub role_name: String,
    /// Field: `pub cluster_scoped_role`.
    pub cluster_scoped_role: bool,
    /// Field: `pub subject_names`.
    pub subject_names: Vec<String>,
}

/// The policy rules attached to every known Role/ClusterRole, keyed the way they're
/// referenced: cluster roles by name, namespaced roles by `(namespace, name)`.
#[derive(Debug, Clone, Default)]
pub struct RoleRuleStore {
    /// Field: `pub cluster_roles`.
    pub cluster_roles: HashMap<String, Vec<PolicyRule>>,
    /// Field: `pub roles`.
    pub roles: HashMap<(String, String), Vec<PolicyRule>>,
}

impl RoleRuleStore {
    /// Function: `pub fn new`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Method: `pub fn set_cluster_role`.
    pub fn set_cluster_role(&mut self, name: &str, rules: Vec<PolicyRule>) {
        self.cluster_roles.insert(name.to_owned(), rules);
    }

    /// Method: `pub fn set_role`.
    pub fn set_role(&mut self, namespace: &str, name: &str, rules: Vec<PolicyRule>) {
        self.roles.insert((namespace.to_owned(), name.to_owned()), rules);
    }

    fn cluster_role_rules(&self, name: &str) -> &[PolicyRule] {
        self.cluster_roles.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    fn role_rules(&self, namespace: &str, name: &str) -> &[PolicyRule] {
        self.roles
            .get(&(namespace.to_owned(), name.to_owned()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Indexes cluster-role-bindings and role-bindings by the subject names they reference.
#[derive(Debug, Clone)]
pub struct PolicyRuleIndex {
    kind: SubjectKind,
    cluster_bindings_by_subject: HashMap<String, Vec<ClusterRoleBinding>>,
    role_bindings_by_subject: HashMap<String, Vec<RoleBinding>>,
}

impl PolicyRuleIndex {
    /// Function: `pub fn new`.
    pub fn new(kind: SubjectKind) -> Self {
        PolicyRuleIndex {
            kind,
            cluster_bindings_by_subject: HashMap::new(),
            role_bindings_by_subject: HashMap::new(),
        }
    }

    /// Method: `pub fn kind`.
    pub fn kind(&self) -> SubjectKind {
        self.kind
    }

    /// Method: `pub fn add_cluster_role_binding`.
    pub fn add_cluster_role_binding(&mut self, binding: ClusterRoleBinding) {
        for subject in &binding.subject_names {
            self.cluster_bindings_by_subject
                .entry(subject.clone())
                .or_default()
                .push(binding.clone());
        }
    }

    /// Method: `pub fn add_role_binding`.
    pub fn add_role_binding(&mut self, binding: RoleBinding) {
        for subject in &binding.subject_names {
            self.role_bindings_by_subject
                .entry(subject.clone())
                .or_default()
                .push(binding.clone());
        }
    }

    /// Cluster-role-bindings naming `subject`, sorted by binding name — the order the hash
    /// computation in `AccessStore::cache_key` requires for stability.
    pub fn matching_cluster_bindings(&self, subject: &str) -> Vec<ClusterRoleBinding> {
        let mut bindings = self
            .cluster_bindings_by_subject
            .get(subject)
            .cloned()
            .unwrap_or_default();
        bindings.sort_by(|a, b| a.name.cmp(&b.name));
        bindings
    }

    /// Role-bindings naming `subject`, sorted by binding UID.
    pub fn matching_role_bindings(&self, subject: &str) -> Vec<RoleBinding> {
        let mut bindings = self.role_bindings_by_subject.get(subject).cloned().unwrap_or_default();
        bindings.sort_by(|a, b| a.uid.cmp(&b.uid));
        bindings
    }

    /// Expand every rule reachable from bindings naming `subject` into an `AccessSet`.
    pub fn access_for(&self, subject: &str, rules: &RoleRuleStore) -> AccessSet {
        let mut set = AccessSet::new();

        for binding in self.matching_cluster_bindings(subject) {
            for rule in rules.cluster_role_rules(&binding.role_name) {
                for (verb, gr, _) in rule.expand() {
                    set.add(&verb, gr, Access::cluster_wide());
                }
            }
        }

        for binding in self.matching_role_bindings(subject) {
            let rule_set = if binding.cluster_scoped_role {
                rules.cluster_role_rules(&binding.role_name)
            } else {
                rules.role_rules(&binding.namespace, &binding.role_name)
            };
            for rule in rule_set {
                for (verb, gr, name) in rule.expand() {
                    set.add(&verb, gr, Access::new(&binding.namespace, &name));
                }
            }
        }

        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steve_core::gvk::GroupResource;

    fn rule(resources: &[&str]) -> PolicyRule {
        PolicyRule {
            verbs: vec!["get".to_owned()],
            api_groups: vec!["".to_owned()],
            resources: resources.iter().map(|s| s.to_string()).collect(),
            resource_names: vec![],
        }
    }

    #[test]
    fn cluster_role_binding_grants_cluster_wide_access() {
        let mut rules = RoleRuleStore::new();
        rules.set_cluster_role("view", vec![rule(&["configmaps"])]);

        let mut index = PolicyRuleIndex::new(SubjectKind::User);
        index.add_cluster_role_binding(ClusterRoleBinding {
            name: "alice-view".to_owned(),
            role_name: "view".to_owned(),
            subject_names: vec!["alice".to_owned()],
        });

        let set = index.access_for("alice", &rules);
        assert!(set.grants("get", &GroupResource::new("", "configmaps"), "any-ns", "any-name"));
    }

    #[test]
    fn role_binding_grants_only_within_its_namespace() {
        let mut rules = RoleRuleStore::new();
        rules.set_role("dev", "editor", vec![rule(&["pods"])]);

        let mut index = PolicyRuleIndex::new(SubjectKind::User);
        index.add_role_binding(RoleBinding {
            uid: "b-1".to_owned(),
            namespace: "dev".to_owned(),
            role_name: "editor".to_owned(),
            cluster_scoped_role: false,
            subject_names: vec!["bob".to_owned()],
        });

        let set = index.access_for("bob", &rules);
        let pods = GroupResource::new("", "pods");
        assert!(set.grants("get", &pods, "dev", "any-name"));
        assert!(!set.grants("get", &pods, "prod", "any-name"));
    }

    #[test]
    fn bindings_are_returned_sorted_for_hash_stability() {
        let mut index = PolicyRuleIndex::new(SubjectKind::User);
        for name in ["zeta", "alpha", "mid"] {
            index.add_cluster_role_binding(ClusterRoleBinding {
                name: name.to_owned(),
                role_name: "view".to_owned(),
                subject_names: vec!["alice".to_owned()],
            });
        }
        let names: Vec<_> = index
            .matching_cluster_bindings("alice")
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
