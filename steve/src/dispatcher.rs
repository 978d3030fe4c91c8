//! Request Dispatcher (§4.K): method-based dispatch, browser CSRF, action validation,
//! and reserved-field translation — the pieces of the outer transport boundary this crate
//! owns directly, as opposed to the URL parsing and wire encoders §1 leaves to the caller.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use rand::RngCore;
use steve_core::access::WILDCARD;
use steve_core::apirequest::{ApiObject, ApiObjectList, ApiRequest, Method};
use steve_core::client::UpstreamClient;
use steve_core::dynamic::DynamicObject;
use steve_core::error::ErrorKind;
use steve_core::gvk::GroupVersionResource;
use steve_core::params::{DeleteOptions, ListParams, Patch, WriteOptions};
use steve_core::schema::ApiSchema;
use steve_core::watch::ApiEvent;
use steve_runtime::WatchGuard;

use crate::accesscontrol::AccessControl;
use crate::store::{partitions_for, ProxyStore, Verb};

/// How often a watch session's [`WatchGuard`] re-checks the caller's access identity (§4.I).
const WATCH_GUARD_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// The caller's CSRF state, as lifted off the request by whatever owns cookies/headers —
/// out of scope for this crate to parse itself (§1), but its shape is a hard contract.
#[derive(Debug, Clone, Default)]
pub struct CsrfContext {
    /// Field: `pub is_browser`.
    pub is_browser: bool,
    /// Field: `pub cookie`.
    pub cookie: Option<String>,
    /// Field: `pub header`.
    pub header: Option<String>,
    /// Field: `pub query`.
    pub query: Option<String>,
}

/// What the CSRF check decided: either the request may proceed, optionally minting a
/// fresh cookie for the caller to set on the response (§4.K "on first GET, mint a 10-hex
/// cookie").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsrfOutcome {
    /// Field: `pub mint_cookie`.
    pub mint_cookie: Option<String>,
}

/// Mint a 10-hex-character CSRF token (5 random bytes, hex-encoded) (§4.K).
pub fn mint_csrf_cookie() -> String {
    let mut bytes = [0u8; 5];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Non-browser requests and GETs pass through untouched (bar minting a cookie on a
/// browser's first visit). Mutating browser requests must present the cookie's value via
/// either the CSRF header or the `CSRF` query parameter, checked against the **apparent**
/// method — a `_method` override must never let an otherwise-CSRF-naked POST through as a
/// disguised GET (§4.K, §6).
pub fn check_csrf(apparent_method: Method, csrf: &CsrfContext) -> Result<CsrfOutcome, ErrorKind> {
    if !csrf.is_browser {
        return Ok(CsrfOutcome::default());
    }
    let Some(cookie) = csrf.cookie.as_deref() else {
        return Ok(CsrfOutcome { mint_cookie: Some(mint_csrf_cookie()) });
    };
    if matches!(apparent_method, Method::Get) {
        return Ok(CsrfOutcome::default());
    }
    let header_matches = csrf.header.as_deref() == Some(cookie);
    let query_matches = csrf.query.as_deref() == Some(cookie);
    if header_matches || query_matches {
        Ok(CsrfOutcome::default())
    } else {
        Err(ErrorKind::invalid_csrf_token())
    }
}

/// Which direction a reserved-field swap runs: `ToWire` swaps the bare key to its
/// underscored form on the way out, `FromWire` reverses it on the way in (§6 "Reserved
/// field translation").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Variant: `ToWire`.
    ToWire,
    /// Variant: `FromWire`.
    FromWire,
}

/// Swap every top-level key in `reserved` between `field` and `_field`, leaving everything
/// else untouched. Only applies to a JSON object; any other shape passes through.
pub fn translate_reserved_fields(value: &mut serde_json::Value, reserved: &[&str], direction: Direction) {
    let serde_json::Value::Object(map) = value else { return };
    for field in reserved {
        let (from, to) = match direction {
            Direction::ToWire => (field.to_string(), format!("_{field}")),
            Direction::FromWire => (format!("_{field}"), field.to_string()),
        };
        if let Some(v) = map.remove(&from) {
            map.insert(to, v);
        }
    }
}

/// A per-schema hook that mutates the request before dispatch — the dynamic counterpart
/// of a Go `Schema.RequestModifier` field (§4.K "Applies per-schema request modifiers").
pub type RequestModifier = Arc<dyn Fn(&mut ApiRequest) + Send + Sync>;

/// Holds request modifiers keyed by schema id, applied once per request against whichever
/// schema the request resolved to.
#[derive(Clone, Default)]
pub struct ModifierRegistry {
    by_schema_id: HashMap<String, Vec<RequestModifier>>,
}

impl ModifierRegistry {
    /// Function: `pub fn new`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Method: `pub fn register`.
    pub fn register(&mut self, schema_id: impl Into<String>, modifier: RequestModifier) {
        self.by_schema_id.entry(schema_id.into()).or_default().push(modifier);
    }

    /// Run every modifier registered for `request.schema_id` against it, in registration order.
    pub fn apply(&self, request: &mut ApiRequest) {
        let Some(modifiers) = self.by_schema_id.get(&request.schema_id) else { return };
        for modifier in modifiers {
            modifier(request);
        }
    }
}

/// The method-and-name-presence dispatch table (§4.K).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchAction {
    /// Variant: `Get`.
    Get,
    /// Variant: `List`.
    List,
    /// Variant: `Create`.
    Create,
    /// Variant: `Action`.
    Action(String),
    /// Variant: `Update`.
    Update,
    /// Variant: `Delete`.
    Delete,
}

/// Resolve which action a request maps to. `action_query` is the `?action=` value, if any
/// — a POST carrying one dispatches to that named action instead of create, but only when
/// `link` is empty and the method is POST (mirroring the original's action/link mutual
/// exclusion).
pub fn resolve_action(method: Method, has_name: bool, action_query: Option<&str>, link: Option<&str>) -> DispatchAction {
    if method == Method::Post && link.map(str::is_empty).unwrap_or(true) {
        if let Some(name) = action_query.filter(|a| !a.is_empty()) {
            return DispatchAction::Action(name.to_string());
        }
    }
    match (method, has_name) {
        (Method::Get, false) => DispatchAction::List,
        (Method::Get, true) => DispatchAction::Get,
        (Method::Put, _) | (Method::Patch, _) => DispatchAction::Update,
        (Method::Post, _) => DispatchAction::Create,
        (Method::Delete, _) => DispatchAction::Delete,
    }
}

/// Confirm `action` is declared on `schema` (§4.K "Validates action requests"). Schemas
/// here carry one flat action list rather than separate resource/collection maps (§3).
pub fn validate_action(schema: &ApiSchema, action: &str) -> Result<(), ErrorKind> {
    if schema.actions.iter().any(|a| a.name == action) {
        Ok(())
    } else {
        Err(ErrorKind::invalid_action(format!("invalid action: {action}")).with_field("action"))
    }
}

/// Status-code policy: 200 for GET/PUT/PATCH/DELETE, 201 for a create, 404 when no schema
/// matched the request — remapped to 401 for the anonymous or error-marker identities
/// (§4.K, matching `system:unauthenticated`/`system:cattle:error` in the original).
pub fn status_for(action: Option<&DispatchAction>, user: &str) -> u16 {
    const ANONYMOUS_USERS: &[&str] = &["system:unauthenticated", "system:cattle:error"];
    match action {
        None => {
            if ANONYMOUS_USERS.contains(&user) {
                401
            } else {
                404
            }
        }
        Some(DispatchAction::Create) => 201,
        Some(_) => 200,
    }
}

/// Signals that a response has already been written and no further dispatch should occur
/// (R2 — modelled as a non-`Err` sentinel rather than an error so `?` cannot silently
/// forward it as a failure) (§7).
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// Variant: `Object`.
    Object(ApiObject),
    /// Variant: `List`.
    List(ApiObjectList),
    /// A custom action or link handler already wrote its own response.
    Complete,
}

/// Ties the schema-based access check, the RBAC partitioner, and the proxy store together
/// to carry out one dispatched request against a single resolved `GroupVersionResource`.
pub struct Dispatcher<C> {
    store: ProxyStore<C>,
}

impl<C> Dispatcher<C>
where
    C: UpstreamClient + 'static,
{
    /// Function: `pub fn new`.
    pub fn new(store: ProxyStore<C>) -> Self {
        Dispatcher { store }
    }

    async fn get(&self, request: &ApiRequest, schema: &ApiSchema, access: &AccessControl<'_>, gvr: &GroupVersionResource) -> Result<DispatchOutcome, ErrorKind> {
        let namespace = request.namespace.clone().unwrap_or_default();
        let name = request.name.clone().unwrap_or_default();
        if !access.can_do(steve_core::discovery::verbs::GET, schema, &namespace, &name) {
            return Err(ErrorKind::permission_denied("get not permitted"));
        }
        let object = self.store.get(gvr, request.namespace.as_deref(), &name).await?;
        Ok(DispatchOutcome::Object(ApiObject::new(schema.id.clone(), object)))
    }

    async fn list(&self, request: &ApiRequest, schema: &ApiSchema, access: &AccessControl<'_>, gvr: &GroupVersionResource) -> Result<DispatchOutcome, ErrorKind> {
        let namespace = request.namespace.clone().unwrap_or_default();
        if !access.can_do(steve_core::discovery::verbs::LIST, schema, &namespace, WILDCARD) {
            return Err(ErrorKind::permission_denied("list not permitted"));
        }
        let gr = steve_core::gvk::GroupResource::new(&schema.attributes.group, &schema.attributes.resource);
        let partitions = partitions_for(Verb::List, request.namespace.as_deref(), None, &gr, access.access_set, None);
        let params = ListParams {
            label_selector: request.query.label_selector.clone(),
            limit: request.query.limit,
            continue_token: request.query.continue_token().map(str::to_owned),
            resource_version: request.query.revision.clone(),
            ..Default::default()
        };
        let merged = self.store.list(gvr, partitions, &params).await?;
        let mut list = ApiObjectList::new(schema.id.clone());
        list.revision = merged.revision;
        list.continue_token = merged.continue_token;
        list.data = merged.items.into_iter().map(|o| ApiObject::new(schema.id.clone(), o)).collect();
        Ok(DispatchOutcome::List(list))
    }

    async fn create(&self, request: &ApiRequest, schema: &ApiSchema, access: &AccessControl<'_>, body: DynamicObject) -> Result<DispatchOutcome, ErrorKind> {
        let namespace = request.namespace.clone().unwrap_or_default();
        if !access.can_do(steve_core::discovery::verbs::CREATE, schema, &namespace, WILDCARD) {
            return Err(ErrorKind::permission_denied("create not permitted"));
        }
        let created = self.store.create(schema, request.namespace.as_deref(), body, &WriteOptions::default()).await?;
        Ok(DispatchOutcome::Object(ApiObject::new(schema.id.clone(), created)))
    }

    async fn update(&self, request: &ApiRequest, schema: &ApiSchema, access: &AccessControl<'_>, gvr: &GroupVersionResource, patch: Patch) -> Result<DispatchOutcome, ErrorKind> {
        let namespace = request.namespace.clone().unwrap_or_default();
        let name = request.name.clone().unwrap_or_default();
        if !access.can_do(steve_core::discovery::verbs::UPDATE, schema, &namespace, &name) {
            return Err(ErrorKind::permission_denied("update not permitted"));
        }
        let updated = self.store.update(gvr, request.namespace.as_deref(), &name, &patch, &WriteOptions::default()).await?;
        Ok(DispatchOutcome::Object(ApiObject::new(schema.id.clone(), updated)))
    }

    async fn delete(&self, request: &ApiRequest, schema: &ApiSchema, access: &AccessControl<'_>, gvr: &GroupVersionResource) -> Result<DispatchOutcome, ErrorKind> {
        let namespace = request.namespace.clone().unwrap_or_default();
        let name = request.name.clone().unwrap_or_default();
        if !access.can_do(steve_core::discovery::verbs::DELETE, schema, &namespace, &name) {
            return Err(ErrorKind::permission_denied("delete not permitted"));
        }
        let deleted = self.store.delete(gvr, request.namespace.as_deref(), &name, &DeleteOptions::default()).await?;
        match deleted {
            Some(object) => Ok(DispatchOutcome::Object(ApiObject::new(schema.id.clone(), object))),
            None => Ok(DispatchOutcome::Complete),
        }
    }

    /// Open a watch for `gvr`, scoped to the partitions `access` grants, and guard it with
    /// a [`WatchGuard`] that cancels the stream early if `current_access_id` — a cheap
    /// fingerprint of the caller's live access, typically `AccessStore::cache_key` —
    /// stops matching the value it returned when the watch opened (§4.I).
    pub async fn watch<F>(
        &self,
        request: &ApiRequest,
        schema: &ApiSchema,
        access: &AccessControl<'_>,
        gvr: &GroupVersionResource,
        mut current_access_id: F,
    ) -> Result<BoxStream<'static, ApiEvent>, ErrorKind>
    where
        F: FnMut() -> String + Send + 'static,
    {
        let namespace = request.namespace.clone().unwrap_or_default();
        if !access.can_do(steve_core::discovery::verbs::WATCH, schema, &namespace, WILDCARD) {
            return Err(ErrorKind::permission_denied("watch not permitted"));
        }
        let gr = steve_core::gvk::GroupResource::new(&schema.attributes.group, &schema.attributes.resource);
        let partitions = partitions_for(Verb::Watch, request.namespace.as_deref(), None, &gr, access.access_set, None);
        let params = ListParams {
            label_selector: request.query.label_selector.clone(),
            resource_version: request.query.revision.clone(),
            ..Default::default()
        };

        let cancellation = request.cancellation.clone();
        let baseline = current_access_id();
        let guard = WatchGuard::new(cancellation.clone(), baseline, WATCH_GUARD_POLL_INTERVAL);
        tokio::spawn(guard.run(current_access_id));

        let upstream = self.store.watch(gvr, partitions, &params, cancellation).await?;
        let schema_id = schema.id.clone();
        Ok(Box::pin(upstream.map(move |event| ApiEvent::from_upstream(&schema_id, event))))
    }

    /// Run the dispatch table for `action`, given a pre-parsed request body where relevant.
    /// The caller is responsible for CSRF, action validation, and reserved-field
    /// translation — this only performs the per-verb RBAC check and store call.
    pub async fn dispatch(
        &self,
        action: &DispatchAction,
        request: &ApiRequest,
        schema: &ApiSchema,
        access: &AccessControl<'_>,
        gvr: &GroupVersionResource,
        body: Option<DynamicObject>,
    ) -> Result<DispatchOutcome, ErrorKind> {
        match action {
            DispatchAction::Get => self.get(request, schema, access, gvr).await,
            DispatchAction::List => self.list(request, schema, access, gvr).await,
            DispatchAction::Create => {
                let body = body.ok_or_else(|| ErrorKind::server_error("create requires a body"))?;
                self.create(request, schema, access, body).await
            }
            DispatchAction::Update => {
                let body = body.ok_or_else(|| ErrorKind::server_error("update requires a body"))?;
                let is_put = request.method == Method::Put;
                let patch = if is_put {
                    Patch::Put(serde_json::to_value(&body).unwrap_or(serde_json::Value::Null))
                } else {
                    Patch::StrategicMerge(serde_json::to_value(&body).unwrap_or(serde_json::Value::Null))
                };
                self.update(request, schema, access, gvr, patch).await
            }
            DispatchAction::Delete => self.delete(request, schema, access, gvr).await,
            DispatchAction::Action(name) => {
                validate_action(schema, name)?;
                Err(ErrorKind::invalid_action(format!("no handler registered for action: {name}")))
            }
        }
    }
}
