//! Query and body parameters for list/watch/write calls against the upstream client.
//!
//! URL/query-string construction is out of scope for this crate (§1 Non-goals) — these
//! types carry already-parsed values between the dispatcher, the store layer, and the
//! upstream client, not raw strings destined for a URL builder.
use serde::Serialize;

/// Parameters accepted on a collection GET/WATCH request's query string (§6).
///
/// `continue_token` is populated from either the upstream-standard `continue` query
/// parameter or this crate's `marker` alias — see [`ListQuery::continue_token`].
#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    /// Result page size.
    pub limit: Option<u32>,
    /// Opaque pagination token from a prior page.
    pub continue_param: Option<String>,
    /// Alias for `continue_param`, accepted for client compatibility (§6).
    pub marker: Option<String>,
    /// Resource version to list/watch from.
    pub revision: Option<String>,
    /// Kubernetes label selector.
    pub label_selector: Option<String>,
    /// Field names to include in the response beyond the default set.
    pub include: Vec<String>,
    /// Field names to drop from the response.
    pub exclude: Vec<String>,
    /// Field names whose values should be dropped (but the key kept).
    pub exclude_values: Vec<String>,
}

impl ListQuery {
    /// The effective continuation token: `continue` takes precedence over `marker`.
    pub fn continue_token(&self) -> Option<&str> {
        self.continue_param.as_deref().or(self.marker.as_deref())
    }
}

/// Parameters passed to the upstream client on a list or watch call.
#[derive(Clone, Debug, Default)]
pub struct ListParams {
    /// Restrict by label.
    pub label_selector: Option<String>,
    /// Restrict by field (namespace/name scoping for a partition shard).
    pub field_selector: Option<String>,
    /// Result page size.
    pub limit: Option<u32>,
    /// Opaque continuation token.
    pub continue_token: Option<String>,
    /// Resource version to start from.
    pub resource_version: Option<String>,
    /// Watch call timeout in seconds; the proxy store defaults this to 1800 (§4.H).
    pub timeout_secs: Option<u32>,
}

impl ListParams {
    /// Build params scoped to one namespace, used by the RBAC partitioner to fan out a
    /// request into per-namespace shards (§4.F).
    #[must_use]
    pub fn in_namespace(mut self, namespace: &str) -> Self {
        self.field_selector = Some(match self.field_selector.take() {
            Some(existing) => format!("{existing},metadata.namespace={namespace}"),
            None => format!("metadata.namespace={namespace}"),
        });
        self
    }

    #[must_use]
    /// Method: `pub fn with_limit`.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    /// Method: `pub fn with_continue`.
    pub fn with_continue(mut self, token: impl Into<String>) -> Self {
        self.continue_token = Some(token.into());
        self
    }
}

/// Options accepted on a create/update/delete call (§4.H).
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /// Persist nothing; report what would have happened.
    pub dry_run: bool,
    /// Identifies the actor making the change.
    pub field_manager: Option<String>,
}

/// Garbage-collection behavior on delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PropagationPolicy {
    /// Leave dependents in place.
    Orphan,
    /// Delete dependents asynchronously.
    Background,
    /// Delete dependents before reporting the parent deleted.
    Foreground,
}

/// Options accepted on a delete call.
#[derive(Clone, Debug, Default)]
pub struct DeleteOptions {
    /// Field: `pub dry_run`.
    pub dry_run: bool,
    /// Field: `pub grace_period_seconds`.
    pub grace_period_seconds: Option<u32>,
    /// Field: `pub propagation_policy`.
    pub propagation_policy: Option<PropagationPolicy>,
}

/// How an update's body should be applied, mirroring the PATCH/PUT split in §4.H:
/// `PATCH` defaults to `StrategicMerge` unless the request content-type says otherwise,
/// `PUT` is a [`Patch::Put`] and requires `metadata.resourceVersion` in the body.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Strategic merge patch (the PATCH default).
    StrategicMerge(serde_json::Value),
    /// RFC 6902 JSON patch, selected by request content-type.
    Json(serde_json::Value),
    /// Full-resource replace; caller must have set `metadata.resourceVersion`.
    Put(serde_json::Value),
}

impl Patch {
    /// The body this patch carries, regardless of strategy.
    pub fn body(&self) -> &serde_json::Value {
        match self {
            Patch::StrategicMerge(v) | Patch::Json(v) | Patch::Put(v) => v,
        }
    }

    /// A PUT replace requires `metadata.resourceVersion` to be present (§4.H optimistic
    /// concurrency rule).
    pub fn validate(&self) -> Result<(), crate::error::ErrorKind> {
        if let Patch::Put(body) = self {
            let has_rv = body
                .get("metadata")
                .and_then(|m| m.get("resourceVersion"))
                .is_some();
            if !has_rv {
                return Err(crate::error::ErrorKind::invalid_action(
                    "PUT update requires metadata.resourceVersion",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continue_token_prefers_continue_over_marker() {
        let q = ListQuery {
            continue_param: Some("a".into()),
            marker: Some("b".into()),
            ..Default::default()
        };
        assert_eq!(q.continue_token(), Some("a"));

        let q = ListQuery {
            marker: Some("b".into()),
            ..Default::default()
        };
        assert_eq!(q.continue_token(), Some("b"));
    }

    #[test]
    fn in_namespace_appends_field_selector() {
        let params = ListParams::default().in_namespace("dev");
        assert_eq!(params.field_selector.as_deref(), Some("metadata.namespace=dev"));
    }

    #[test]
    fn put_patch_requires_resource_version() {
        let patch = Patch::Put(serde_json::json!({"metadata": {}}));
        assert!(patch.validate().is_err());

        let patch = Patch::Put(serde_json::json!({"metadata": {"resourceVersion": "5"}}));
        assert!(patch.validate().is_ok());
    }
}
