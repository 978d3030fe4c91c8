//! Decomposes a request into `Partition` shards the caller's `AccessSet` actually covers
//! (§4.F), so the proxy store never issues an upstream call wider than what RBAC grants.
use std::collections::HashMap;

use steve_core::access::{AccessSet, WILDCARD};
use steve_core::gvk::GroupResource;
use steve_core::partition::{NameSelector, Partition};

/// The RBAC verb a list/watch/get/create/update/delete request is partitioned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Variant: `Get`.
    Get,
    /// Variant: `Create`.
    Create,
    /// Variant: `Update`.
    Update,
    /// Variant: `Delete`.
    Delete,
    /// Variant: `List`.
    List,
    /// Variant: `Watch`.
    Watch,
}

impl Verb {
    fn rbac_name(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
            Verb::List => "list",
            Verb::Watch => "watch",
        }
    }

    fn is_single_object(self) -> bool {
        matches!(self, Verb::Get | Verb::Create | Verb::Update | Verb::Delete)
    }
}

/// Decompose one request into partitions (§4.F).
///
/// `namespace`/`name` are the request's own path-derived scope (already parsed out of a
/// `namespace/name` or bare `name` id); `namespace_constraint`, when present, is an
/// additional namespace upstream middleware pinned the request to, and narrows (or, for a
/// passthrough, replaces) whatever this function would otherwise have produced.
pub fn partitions_for(
    verb: Verb,
    namespace: Option<&str>,
    name: Option<&str>,
    gr: &GroupResource,
    access: &AccessSet,
    namespace_constraint: Option<&str>,
) -> Vec<Partition> {
    let mut partitions = if verb.is_single_object() {
        vec![Partition::Passthrough]
    } else if let Some(name) = name {
        vec![Partition::namespace_names(namespace.unwrap_or_default(), vec![name.to_string()])]
    } else {
        collection_partitions(verb, namespace, gr, access)
    };

    if let Some(constraint) = namespace_constraint {
        partitions = constrain_to_namespace(partitions, constraint);
    }

    Partition::sort_by_namespace(&mut partitions);
    partitions
}

fn collection_partitions(verb: Verb, namespace: Option<&str>, gr: &GroupResource, access: &AccessSet) -> Vec<Partition> {
    let rbac_verb = verb.rbac_name();

    if access.grants(rbac_verb, gr, WILDCARD, WILDCARD) {
        return vec![Partition::Passthrough];
    }

    if let Some(ns) = namespace {
        if access.grants(rbac_verb, gr, ns, WILDCARD) {
            return vec![Partition::Passthrough];
        }
        let names: Vec<String> = access
            .access_list_for(rbac_verb, gr)
            .into_iter()
            .filter(|a| a.namespace == ns)
            .map(|a| a.resource_name)
            .collect();
        return vec![Partition::namespace_names(ns, names)];
    }

    let mut by_namespace: HashMap<String, NameSelector> = HashMap::new();
    for grant in access.access_list_for(rbac_verb, gr) {
        if grant.resource_name == WILDCARD {
            by_namespace.insert(grant.namespace, NameSelector::All);
        } else {
            by_namespace
                .entry(grant.namespace)
                .and_modify(|sel| {
                    if let NameSelector::Names(names) = sel {
                        names.push(grant.resource_name.clone());
                    }
                })
                .or_insert_with(|| NameSelector::Names(vec![grant.resource_name.clone()]));
        }
    }

    by_namespace
        .into_iter()
        .map(|(namespace, names)| Partition::Scoped { namespace, names })
        .collect()
}

fn constrain_to_namespace(partitions: Vec<Partition>, constraint: &str) -> Vec<Partition> {
    let mut out = Vec::new();
    for partition in partitions {
        match partition {
            Partition::Passthrough => out.push(Partition::namespace_all(constraint)),
            Partition::Scoped { namespace, names } if namespace == constraint => {
                out.push(Partition::Scoped { namespace, names });
            }
            Partition::Scoped { .. } => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use steve_core::access::Access;

    fn gr() -> GroupResource {
        GroupResource::new("", "configmaps")
    }

    #[test]
    fn single_object_verbs_are_always_passthrough() {
        let access = AccessSet::new();
        for verb in [Verb::Get, Verb::Create, Verb::Update, Verb::Delete] {
            let partitions = partitions_for(verb, Some("dev"), Some("x"), &gr(), &access, None);
            assert_eq!(partitions, vec![Partition::Passthrough]);
        }
    }

    #[test]
    fn list_with_name_is_a_single_scoped_partition() {
        let access = AccessSet::new();
        let partitions = partitions_for(Verb::List, Some("dev"), Some("my-cm"), &gr(), &access, None);
        assert_eq!(partitions, vec![Partition::namespace_names("dev", vec!["my-cm".into()])]);
    }

    #[test]
    fn cluster_wide_grant_is_passthrough() {
        let mut access = AccessSet::new();
        access.add("list", gr(), Access::cluster_wide());
        let partitions = partitions_for(Verb::List, None, None, &gr(), &access, None);
        assert_eq!(partitions, vec![Partition::Passthrough]);
    }

    #[test]
    fn namespace_wildcard_grant_within_requested_namespace_is_passthrough() {
        let mut access = AccessSet::new();
        access.add("list", gr(), Access::new("dev", "*"));
        let partitions = partitions_for(Verb::List, Some("dev"), None, &gr(), &access, None);
        assert_eq!(partitions, vec![Partition::Passthrough]);
    }

    #[test]
    fn per_namespace_grants_produce_one_partition_each() {
        let mut access = AccessSet::new();
        access.add("list", gr(), Access::new("dev", "*"));
        access.add("list", gr(), Access::new("prod", "my-cm"));
        let partitions = partitions_for(Verb::List, None, None, &gr(), &access, None);
        assert_eq!(
            partitions,
            vec![Partition::namespace_all("dev"), Partition::namespace_names("prod", vec!["my-cm".into()])]
        );
    }

    #[test]
    fn namespace_constraint_narrows_a_passthrough_down() {
        let mut access = AccessSet::new();
        access.add("list", gr(), Access::cluster_wide());
        let partitions = partitions_for(Verb::List, None, None, &gr(), &access, Some("dev"));
        assert_eq!(partitions, vec![Partition::namespace_all("dev")]);
    }

    #[test]
    fn namespace_constraint_drops_partitions_outside_it() {
        let mut access = AccessSet::new();
        access.add("list", gr(), Access::new("dev", "*"));
        access.add("list", gr(), Access::new("prod", "*"));
        let partitions = partitions_for(Verb::List, None, None, &gr(), &access, Some("dev"));
        assert_eq!(partitions, vec![Partition::namespace_all("dev")]);
    }
}
