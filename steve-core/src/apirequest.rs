//! `APIRequest`: the per-request envelope threaded through the dispatcher and store layer
//! (§3), plus `APIObject`/`APIObjectList`, the transport wrappers every store returns.
use crate::dynamic::DynamicObject;
use crate::params::ListQuery;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// The HTTP method a request arrived as, after `_method` override resolution (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Variant: `Get`.
    Get,
    /// Variant: `Post`.
    Post,
    /// Variant: `Put`.
    Put,
    /// Variant: `Patch`.
    Patch,
    /// Variant: `Delete`.
    Delete,
}

/// Per-request envelope (§3). Cloning an `APIRequest` shares nothing mutable with the
/// original path — the cancellation token is the one exception, shared deliberately so
/// every clone observes the same cancellation.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Field: `pub method`.
    pub method: Method,
    /// The *apparent* method, before `_method` override — CSRF checks use this, not
    /// `method` (§6).
    pub apparent_method: Method,
    /// Field: `pub schema_id`.
    pub schema_id: String,
    /// Field: `pub namespace`.
    pub namespace: Option<String>,
    /// Field: `pub name`.
    pub name: Option<String>,
    /// Field: `pub action`.
    pub action: Option<String>,
    /// Field: `pub link`.
    pub link: Option<String>,
    /// Field: `pub query`.
    pub query: ListQuery,
    /// Field: `pub user`.
    pub user: String,
    /// Field: `pub groups`.
    pub groups: Vec<String>,
    /// Field: `pub cancellation`.
    pub cancellation: CancellationToken,
}

impl ApiRequest {
    /// The upstream `id` this request targets: `namespace/name` or bare `name`, matching
    /// `APIObject::id`'s rule (§3).
    pub fn id(&self) -> Option<String> {
        match (&self.namespace, &self.name) {
            (Some(ns), Some(name)) if !ns.is_empty() => Some(format!("{ns}/{name}")),
            (_, Some(name)) => Some(name.clone()),
            _ => None,
        }
    }

    /// Method: `pub fn is_collection_request`.
    pub fn is_collection_request(&self) -> bool {
        self.name.is_none()
    }
}

/// Transport wrapper around a single object: `{type, id, object}` (§3).
#[derive(Debug, Clone, Serialize)]
pub struct ApiObject {
    #[serde(rename = "type")]
    /// Field: `pub schema_type`.
    pub schema_type: String,
    /// Field: `pub id`.
    pub id: String,
    /// Field: `pub object`.
    pub object: DynamicObject,
}

impl ApiObject {
    /// Function: `pub fn new`.
    pub fn new(schema_type: impl Into<String>, object: DynamicObject) -> Self {
        ApiObject {
            schema_type: schema_type.into(),
            id: object.id(),
            object,
        }
    }
}

/// Transport wrapper around a collection, additionally carrying `revision` and `continue`
/// tokens (§3, §4.G).
#[derive(Debug, Clone, Serialize, Default)]
pub struct ApiObjectList {
    #[serde(rename = "type")]
    /// Field: `pub schema_type`.
    pub schema_type: String,
    /// Field: `pub data`.
    pub data: Vec<ApiObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Field: `pub revision`.
    pub revision: Option<String>,
    #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
    /// Field: `pub continue_token`.
    pub continue_token: Option<String>,
}

impl ApiObjectList {
    /// Function: `pub fn new`.
    pub fn new(schema_type: impl Into<String>) -> Self {
        ApiObjectList {
            schema_type: schema_type.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ApiRequest {
        ApiRequest {
            method: Method::Get,
            apparent_method: Method::Get,
            schema_id: "configmap".into(),
            namespace: None,
            name: None,
            action: None,
            link: None,
            query: ListQuery::default(),
            user: "alice".into(),
            groups: vec![],
            cancellation: CancellationToken::new(),
        }
    }

    #[test]
    fn id_is_namespace_slash_name_when_both_present() {
        let mut req = request();
        req.namespace = Some("dev".into());
        req.name = Some("my-cm".into());
        assert_eq!(req.id().as_deref(), Some("dev/my-cm"));
    }

    #[test]
    fn id_is_bare_name_when_no_slash() {
        let mut req = request();
        req.name = Some("my-cm".into());
        assert_eq!(req.id().as_deref(), Some("my-cm"));
    }

    #[test]
    fn collection_request_has_no_name() {
        assert!(request().is_collection_request());
    }

    #[test]
    fn api_object_id_matches_dynamic_object_id() {
        let obj = DynamicObject::new("my-cm", "v1", "ConfigMap").within("dev");
        let wrapped = ApiObject::new("configmap", obj);
        assert_eq!(wrapped.id, "dev/my-cm");
    }
}
