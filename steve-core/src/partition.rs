//! `Partition`: a shard descriptor the RBAC Partitioner decomposes a request into (§3, §4.F).
use std::cmp::Ordering;

/// Which resource names a partition covers within its namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameSelector {
    /// Every name in the namespace.
    All,
    /// Only these names.
    Names(Vec<String>),
}

/// A shard of a list/watch request, scoped to a namespace and optionally a set of
/// resource names (§3, glossary "Partition").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partition {
    /// Forward the call verbatim; no RBAC narrowing needed (glossary "Passthrough partition").
    Passthrough,
    /// Scoped to one namespace (empty for cluster-scoped schemas) and a name selector.
    Scoped {
        /// The namespace this partition is scoped to.
        namespace: String,
        /// Which resource names within the namespace this partition covers.
        names: NameSelector,
    },
}

impl Partition {
    /// Function: `pub fn passthrough`.
    pub fn passthrough() -> Self {
        Partition::Passthrough
    }

    /// Function: `pub fn namespace_all`.
    pub fn namespace_all(namespace: impl Into<String>) -> Self {
        Partition::Scoped {
            namespace: namespace.into(),
            names: NameSelector::All,
        }
    }

    /// Function: `pub fn namespace_names`.
    pub fn namespace_names(namespace: impl Into<String>, names: Vec<String>) -> Self {
        Partition::Scoped {
            namespace: namespace.into(),
            names: NameSelector::Names(names),
        }
    }

    /// The namespace this partition is scoped to, empty for passthrough or cluster scope.
    pub fn namespace(&self) -> &str {
        match self {
            Partition::Passthrough => "",
            Partition::Scoped { namespace, .. } => namespace,
        }
    }

    /// Sort a partition list by namespace ascending, the ordering the fan-out and merge
    /// step depend on for deterministic pagination (§4.F, §4.G).
    pub fn sort_by_namespace(partitions: &mut [Partition]) {
        partitions.sort_by(|a, b| partition_order(a, b));
    }
}

fn partition_order(a: &Partition, b: &Partition) -> Ordering {
    a.namespace().cmp(b.namespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_by_namespace_is_ascending() {
        let mut partitions = vec![
            Partition::namespace_all("prod"),
            Partition::namespace_all("dev"),
            Partition::namespace_all("acme"),
        ];
        Partition::sort_by_namespace(&mut partitions);
        let namespaces: Vec<&str> = partitions.iter().map(Partition::namespace).collect();
        assert_eq!(namespaces, vec!["acme", "dev", "prod"]);
    }

    #[test]
    fn passthrough_has_empty_namespace() {
        assert_eq!(Partition::passthrough().namespace(), "");
    }
}
