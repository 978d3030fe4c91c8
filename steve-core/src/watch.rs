//! Outbound watch event shapes (§6 "Watch transport", §4.H Proxy Store event mapping).
use crate::dynamic::DynamicObject;
use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};

/// The event name written on the wire, one per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    /// `resource.create`
    #[serde(rename = "resource.create")]
    Create,
    /// `resource.change`
    #[serde(rename = "resource.change")]
    Change,
    /// `resource.remove`
    #[serde(rename = "resource.remove")]
    Remove,
    /// `resource.error`
    #[serde(rename = "resource.error")]
    Error,
}

/// A raw upstream watch event, before it is mapped to an [`ApiEvent`].
///
/// Mirrors `kube-core::WatchEvent`'s `Added`/`Modified`/`Deleted`/`Error` shape, but over
/// `DynamicObject` rather than a typed `K` — the upstream client this crate assumes only
/// ever returns `Unstructured` payloads.
#[derive(Debug, Clone)]
pub enum UpstreamEvent {
    /// Object was added.
    Added(DynamicObject),
    /// Object was modified.
    Modified(DynamicObject),
    /// Object was deleted.
    Deleted(DynamicObject),
    /// The watch itself errored; no object is carried.
    Error(ErrorKind),
}

impl UpstreamEvent {
    /// Map `Added→Create`, `Modified→Change`, `Deleted→Remove`, `Error→Error` (§4.H).
    pub fn event_name(&self) -> EventName {
        match self {
            UpstreamEvent::Added(_) => EventName::Create,
            UpstreamEvent::Modified(_) => EventName::Change,
            UpstreamEvent::Deleted(_) => EventName::Remove,
            UpstreamEvent::Error(_) => EventName::Error,
        }
    }

    /// The carried object, if any (absent for `Error`).
    pub fn object(&self) -> Option<&DynamicObject> {
        match self {
            UpstreamEvent::Added(o) | UpstreamEvent::Modified(o) | UpstreamEvent::Deleted(o) => Some(o),
            UpstreamEvent::Error(_) => None,
        }
    }
}

/// The event shape the request dispatcher streams to a client: `{name, resourceType,
/// object, revision, error?}` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct ApiEvent {
    /// One of the four wire event names.
    pub name: EventName,
    /// The schema id this event belongs to.
    pub resource_type: String,
    /// The object payload, omitted on error events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<DynamicObject>,
    /// The object's resource version at the time of this event, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// A human-readable error message, present only on `resource.error` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiEvent {
    /// Build an event for a successful add/modify/delete from an upstream event.
    pub fn from_upstream(resource_type: &str, event: UpstreamEvent) -> Self {
        let name = event.event_name();
        match event {
            UpstreamEvent::Error(kind) => ApiEvent {
                name,
                resource_type: resource_type.to_string(),
                object: None,
                revision: None,
                error: Some(kind.message.clone()),
            },
            UpstreamEvent::Added(obj) | UpstreamEvent::Modified(obj) | UpstreamEvent::Deleted(obj) => {
                let revision = obj.metadata.resource_version.clone();
                ApiEvent {
                    name,
                    resource_type: resource_type.to_string(),
                    object: Some(obj),
                    revision,
                    error: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_name_mapping_matches_spec_table() {
        let obj = DynamicObject::new("a", "v1", "ConfigMap");
        assert_eq!(UpstreamEvent::Added(obj.clone()).event_name(), EventName::Create);
        assert_eq!(UpstreamEvent::Modified(obj.clone()).event_name(), EventName::Change);
        assert_eq!(UpstreamEvent::Deleted(obj).event_name(), EventName::Remove);
        assert_eq!(
            UpstreamEvent::Error(ErrorKind::server_error("boom")).event_name(),
            EventName::Error
        );
    }

    #[test]
    fn api_event_carries_revision_from_object_metadata() {
        let mut obj = DynamicObject::new("a", "v1", "ConfigMap");
        obj.metadata.resource_version = Some("7".into());
        let ev = ApiEvent::from_upstream("configmap", UpstreamEvent::Added(obj));
        assert_eq!(ev.revision.as_deref(), Some("7"));
        assert_eq!(ev.name, EventName::Create);
    }

    #[test]
    fn api_event_from_error_carries_no_object() {
        let ev = ApiEvent::from_upstream("configmap", UpstreamEvent::Error(ErrorKind::server_error("boom")));
        assert!(ev.object.is_none());
        assert_eq!(ev.error.as_deref(), Some("boom"));
    }
}
