//! Per-schema tallies the Counts Subsystem aggregates and streams (§3, §4.J).
use serde::Serialize;
use std::collections::BTreeMap;

/// The reduction of an object's status conditions into a compact triple (§4.J,
/// "Summarization" in the glossary).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Field: `pub transitioning`.
    pub transitioning: bool,
    /// Field: `pub error`.
    pub error: bool,
    /// `"error"` if `error`, else `"in-progress"` if `transitioning`, else empty (§4.J).
    pub state: String,
}

impl Summary {
    /// Function: `pub fn new`.
    pub fn new(transitioning: bool, error: bool) -> Self {
        let state = if error {
            "error"
        } else if transitioning {
            "in-progress"
        } else {
            ""
        };
        Summary {
            transitioning,
            error,
            state: state.to_string(),
        }
    }

    /// Whether this summary differs from `other` in any field the dispatcher cares about
    /// (§4.J: "if `{transitioning, error, simpleState}` are all unchanged the event is
    /// dropped").
    pub fn differs_from(&self, other: &Summary) -> bool {
        self != other
    }
}

/// Per-namespace breakdown within an [`ItemCount`].
pub type NamespaceCounts = BTreeMap<String, u64>;

/// One schema's tally: total, transitioning, error, per-state, and per-namespace counts,
/// plus the highest resource version folded in so far (for idempotent ingest) (§3, §4.J).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemCount {
    /// Field: `pub count`.
    pub count: u64,
    /// Field: `pub transitioning`.
    pub transitioning: u64,
    /// Field: `pub error`.
    pub error: u64,
    /// Field: `pub states`.
    pub states: BTreeMap<String, u64>,
    /// Field: `pub namespaces`.
    pub namespaces: NamespaceCounts,
    /// The highest `resourceVersion` folded into this tally. Updates carrying a revision
    /// `<=` this are ignored (§4.J revision guard).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
}

impl ItemCount {
    /// Fold in one object's summary, bumping `count` and the relevant tallies. Returns
    /// `false` (and does nothing) if `revision` is not newer than what's already folded in.
    pub fn add(&mut self, namespace: &str, summary: &Summary, revision: Option<u64>) -> bool {
        if let (Some(incoming), Some(seen)) = (revision, self.revision) {
            if incoming <= seen {
                return false;
            }
        }
        self.count += 1;
        if summary.transitioning {
            self.transitioning += 1;
        }
        if summary.error {
            self.error += 1;
        }
        if !summary.state.is_empty() {
            *self.states.entry(summary.state.clone()).or_default() += 1;
        }
        *self.namespaces.entry(namespace.to_string()).or_default() += 1;
        if let Some(rev) = revision {
            self.revision = Some(self.revision.map_or(rev, |seen| seen.max(rev)));
        }
        true
    }

    /// Remove one object's contribution, mirroring [`ItemCount::add`]'s bookkeeping.
    pub fn remove(&mut self, namespace: &str, summary: &Summary) {
        self.count = self.count.saturating_sub(1);
        if summary.transitioning {
            self.transitioning = self.transitioning.saturating_sub(1);
        }
        if summary.error {
            self.error = self.error.saturating_sub(1);
        }
        if !summary.state.is_empty() {
            if let Some(n) = self.states.get_mut(&summary.state) {
                *n = n.saturating_sub(1);
            }
        }
        if let Some(n) = self.namespaces.get_mut(namespace) {
            *n = n.saturating_sub(1);
        }
    }
}

/// The complete counts response: one [`ItemCount`] per schema id, the shape the synthetic
/// `count` schema's `List`/`ByID` returns (§4.J).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Count {
    /// Field: `pub counts`.
    pub counts: BTreeMap<String, ItemCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_state_prefers_error_over_transitioning() {
        assert_eq!(Summary::new(true, true).state, "error");
        assert_eq!(Summary::new(true, false).state, "in-progress");
        assert_eq!(Summary::new(false, false).state, "");
    }

    #[test]
    fn add_ignores_stale_revisions() {
        let mut tally = ItemCount::default();
        assert!(tally.add("dev", &Summary::new(false, false), Some(5)));
        assert_eq!(tally.count, 1);
        assert!(!tally.add("dev", &Summary::new(false, false), Some(3)));
        assert_eq!(tally.count, 1);
        assert!(tally.add("dev", &Summary::new(false, false), Some(7)));
        assert_eq!(tally.count, 2);
    }

    #[test]
    fn remove_undoes_add_bookkeeping() {
        let mut tally = ItemCount::default();
        let summary = Summary::new(true, false);
        tally.add("dev", &summary, None);
        assert_eq!(tally.transitioning, 1);
        tally.remove("dev", &summary);
        assert_eq!(tally.count, 0);
        assert_eq!(tally.transitioning, 0);
    }
}
