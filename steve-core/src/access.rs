//! The Access Set data model (§3, §4.A): "what a user may do", expanded from RBAC rules
//! into a `(verb, GroupResource) -> [Access]` index with a content-addressable `id`.
use crate::gvk::GroupResource;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The sentinel used for "any namespace" / "any resource name" / "any subject name".
pub const WILDCARD: &str = "*";

/// One grant: a namespace/resource-name pair, either of which may be the wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Access {
    /// Field: `pub namespace`.
    pub namespace: String,
    /// Field: `pub resource_name`.
    pub resource_name: String,
}

impl Access {
    /// Function: `pub fn new`.
    pub fn new(namespace: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Access {
            namespace: namespace.into(),
            resource_name: resource_name.into(),
        }
    }

    /// A grant covering every namespace and every resource name.
    pub fn cluster_wide() -> Self {
        Access::new(WILDCARD, WILDCARD)
    }

    fn matches(&self, namespace: &str, name: &str) -> bool {
        (self.namespace == WILDCARD || self.namespace == namespace)
            && (self.resource_name == WILDCARD || self.resource_name == name)
    }
}

/// A resolved RBAC binding subject (§3.A), grounded in `policy_rule_index.go`'s
/// subject-matching branches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// Variant: `User`.
    User(String),
    /// Variant: `Group`.
    Group(String),
    /// A service account subject, identified by namespace and name.
    ServiceAccount {
        /// The namespace the service account lives in.
        namespace: String,
        /// The service account's name.
        name: String,
    },
}

impl Subject {
    /// The name this subject matches a `User`-kind binding subject against: a plain user
    /// keeps its name, a service account is re-encoded `serviceaccount:<ns>:<name>`.
    pub fn user_match_name(&self) -> Option<String> {
        match self {
            Subject::User(name) => Some(name.clone()),
            Subject::ServiceAccount { namespace, name } => {
                Some(format!("serviceaccount:{namespace}:{name}"))
            }
            Subject::Group(_) => None,
        }
    }

    /// The name this subject matches a `Group`-kind binding subject against.
    pub fn group_match_name(&self) -> Option<&str> {
        match self {
            Subject::Group(name) => Some(name),
            _ => None,
        }
    }
}

/// `{kind: Role|ClusterRole, name}` (§3.A), taken from `rbacv1.RoleRef` usage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleRef {
    /// Field: `pub cluster_scoped`.
    pub cluster_scoped: bool,
    /// Field: `pub name`.
    pub name: String,
}

/// An RBAC rule as it appears on a Role/ClusterRole, before cartesian expansion (§3.A, §4.A).
#[derive(Debug, Clone, Default)]
pub struct PolicyRule {
    /// Field: `pub verbs`.
    pub verbs: Vec<String>,
    /// Field: `pub api_groups`.
    pub api_groups: Vec<String>,
    /// Field: `pub resources`.
    pub resources: Vec<String>,
    /// Field: `pub resource_names`.
    pub resource_names: Vec<String>,
}

impl PolicyRule {
    /// Expand into `verbs × apiGroups × resources × (resourceNames ∪ {"*"})` (§4.A). Empty
    /// `resourceNames` expands to the single wildcard.
    pub fn expand(&self) -> Vec<(String, GroupResource, String)> {
        let owned_wildcard = vec![WILDCARD.to_string()];
        let names: &[String] = if self.resource_names.is_empty() {
            &owned_wildcard
        } else {
            &self.resource_names
        };
        let mut out = Vec::new();
        for verb in &self.verbs {
            for group in &self.api_groups {
                for resource in &self.resources {
                    for name in names {
                        out.push((
                            verb.clone(),
                            GroupResource::new(group, resource),
                            name.clone(),
                        ));
                    }
                }
            }
        }
        out
    }
}

/// A user's precomputed permission index (§3, §4.A).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessSet {
    grants: HashMap<(String, GroupResource), HashSet<Access>>,
    /// Content-addressable identity; set by whoever constructs this (the Access Store),
    /// not computed here — `AccessSet` itself has no hashing concerns.
    pub id: String,
}

impl AccessSet {
    /// Function: `pub fn new`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one access grant for `(verb, gr)`.
    pub fn add(&mut self, verb: impl Into<String>, gr: GroupResource, access: Access) {
        self.grants.entry((verb.into(), gr)).or_default().insert(access);
    }

    /// Union another set's grants into this one. Idempotent and commutative: merging the
    /// same set twice, or merging `a` into `b` vs `b` into `a`, yields the same grant
    /// contents (§4.A).
    pub fn merge(&mut self, other: &AccessSet) {
        for (key, accesses) in &other.grants {
            self.grants
                .entry(key.clone())
                .or_default()
                .extend(accesses.iter().cloned());
        }
    }

    /// True if any recorded access for `(verb, gr)` covers `(namespace, name)` (§4.A).
    pub fn grants(&self, verb: &str, gr: &GroupResource, namespace: &str, name: &str) -> bool {
        self.grants
            .get(&(verb.to_string(), gr.clone()))
            .map(|set| set.iter().any(|a| a.matches(namespace, name)))
            .unwrap_or(false)
    }

    /// All access records for `(verb, gr)`, empty if none.
    pub fn access_list_for(&self, verb: &str, gr: &GroupResource) -> Vec<Access> {
        self.grants
            .get(&(verb.to_string(), gr.clone()))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every namespace this set grants anything in, across all verbs and resources.
    /// `*` is included verbatim when a grant is cluster-wide.
    pub fn namespaces(&self) -> HashSet<String> {
        self.grants
            .values()
            .flat_map(|set| set.iter().map(|a| a.namespace.clone()))
            .collect()
    }

    /// True if this set grants nothing at all.
    pub fn is_empty(&self) -> bool {
        self.grants.values().all(|set| set.is_empty())
    }
}
