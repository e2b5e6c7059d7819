// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP facade for the data-hub storage service.
//!
//! Binds the routes to sequences of (identifier validation → authorization →
//! storage execution). Hub lifecycle routes authenticate through the legacy
//! permission bridge; everything else proves a capability invocation with an
//! HTTP signature. Store and verifier errors map to HTTP statuses through
//! [`api::ApiError`].
#![deny(unsafe_code)]

/// Error envelope and HTTP mapping.
pub mod api;
/// Request-id, logging, and CORS middleware.
pub mod middleware;
/// Legacy session-auth permission bridge.
pub mod permission;

use api::ApiResult;
use async_trait::async_trait;
use axum::{
    extract::{Path as AxPath, Query, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hub_config::ServerConfig;
use hub_core::{id, Action, Capability, Chunk, Document, HubConfig};
use hub_error::{HubError, HubResult};
use hub_store::{HubStore, Query as BlindedQuery, QueryPlan};
use hub_zcap::delegation::verify_delegation;
use hub_zcap::{
    ConfigSource, DelegationStore, DidKeyResolver, Expectation, HttpRequestContext,
    InvocationVerifier, Invoker, KeyResolver, RootCapabilityRegistry,
};
use permission::{
    AccountPermissions, PermissionAuthority, PERM_HUB_CREATE, PERM_HUB_READ, PERM_HUB_UPDATE,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared service state. Every component is constructed once from the
/// immutable configuration; handlers only read.
pub struct AppState {
    /// Immutable server configuration.
    pub config: ServerConfig,
    /// The document store.
    pub store: HubStore,
    /// Delegated-capability storage.
    pub delegations: DelegationStore,
    /// Root-capability materialization.
    pub registry: RootCapabilityRegistry,
    /// The invocation verifier.
    pub verifier: InvocationVerifier,
    /// The legacy permission authority.
    pub permissions: Arc<dyn PermissionAuthority>,
    /// Verification-key resolver, shared with the verifier.
    pub resolver: Arc<DidKeyResolver>,
}

/// Wire all components up from a configuration value.
#[must_use]
pub fn build_state(config: ServerConfig) -> Arc<AppState> {
    let store = HubStore::new();
    let delegations = DelegationStore::new();
    let registry = RootCapabilityRegistry::new(config.base_url.clone());
    let resolver = Arc::new(DidKeyResolver::new());
    let verifier = InvocationVerifier::new(
        config.expected_host(),
        config.clock_skew_secs,
        registry.clone(),
        delegations.clone(),
        resolver.clone(),
    );
    let permissions = Arc::new(AccountPermissions::from_grants(&config.accounts));
    Arc::new(AppState {
        config,
        store,
        delegations,
        registry,
        verifier,
        permissions,
        resolver,
    })
}

/// Hub-configuration lookup for the verifier, threaded through as an
/// explicit dependency rather than a re-entrant facade call.
struct StoreConfigSource(HubStore);

#[async_trait]
impl ConfigSource for StoreConfigSource {
    async fn config_for_hub(&self, hub_id: &str) -> HubResult<HubConfig> {
        Ok(self.0.get_config(hub_id).await?.config)
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the Axum router with all service routes.
///
/// Capability-protected routes get a wide-open CORS layer; authorization is
/// carried in signed headers, never cookies.
pub fn build_app(state: Arc<AppState>) -> Router {
    let lifecycle = Router::new()
        .route("/data-hubs", post(create_hub).get(list_hubs))
        .route("/data-hubs/{hub_id}", post(update_hub).get(get_hub))
        .route("/data-hubs/{hub_id}/zcaps/{*path}", get(get_root_capability));

    let protected = Router::new()
        .route("/data-hubs/{hub_id}/documents", post(insert_document))
        .route(
            "/data-hubs/{hub_id}/documents/{doc_id}",
            post(update_document)
                .get(get_document)
                .delete(delete_document),
        )
        .route("/data-hubs/{hub_id}/query", post(query_hub))
        .route(
            "/data-hubs/{hub_id}/documents/{doc_id}/chunks/{chunk_index}",
            post(update_chunk).get(get_chunk).delete(delete_chunk),
        )
        .route(
            "/data-hubs/{hub_id}/authorizations",
            post(insert_authorization)
                .get(get_authorizations)
                .delete(delete_authorization),
        )
        .layer(middleware::capability_cors());

    lifecycle
        .merge(protected)
        .layer(from_fn(middleware::RequestLogger::layer))
        .layer(from_fn(middleware::request_id_middleware))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// The canonical URL of a hub.
fn hub_url(state: &AppState, hub_id: &str) -> String {
    format!("{}/data-hubs/{hub_id}", state.config.base_url)
}

/// Lowercased header map for signature verification.
fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_owned(), v.to_owned()))
        })
        .collect()
}

/// The request path plus query, as covered by `(request-target)`.
fn path_and_query(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| uri.path().to_owned())
}

/// Run the invocation verifier for a route.
async fn authorize(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    has_body: bool,
    target: String,
    root_capability: String,
    action: Action,
) -> ApiResult<Invoker> {
    let map = header_map(headers);
    let pq = path_and_query(uri);
    let ctx = HttpRequestContext {
        method: method.as_str(),
        path_and_query: &pq,
        headers: &map,
        has_body,
    };
    let expect = Expectation {
        target,
        root_capability,
        action,
    };
    let source = StoreConfigSource(state.store.clone());
    Ok(state.verifier.verify(ctx, &expect, &source).await?)
}

/// The externally authenticated account for session routes.
fn session_account(headers: &HeaderMap) -> ApiResult<String> {
    headers
        .get("x-account-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| HubError::permission_denied("authentication required").into())
}

/// Deserialize a JSON body into a typed value, mapping failures to
/// `DataError`.
fn parse_body<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> ApiResult<T> {
    serde_json::from_value(value)
        .map_err(|e| HubError::data(format!("malformed request body: {e}")).into())
}

// ---------------------------------------------------------------------------
// Hub lifecycle (session-authenticated)
// ---------------------------------------------------------------------------

async fn create_hub(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Response> {
    let account = session_account(&headers)?;
    state
        .permissions
        .check(&account, PERM_HUB_CREATE, &[])?;

    let mut config: HubConfig = parse_body(body)?;
    config.id = id::generate();
    let record = state.store.insert_config(config).await?;

    let location = hub_url(&state, &record.config.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(record.config),
    )
        .into_response())
}

async fn list_hubs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<HubConfig>>> {
    let account = session_account(&headers)?;
    state.permissions.check(&account, PERM_HUB_READ, &[])?;

    let controller = params
        .get("controller")
        .ok_or_else(|| HubError::data("controller query parameter is required"))?;
    let reference_id = params
        .get("referenceId")
        .ok_or_else(|| HubError::data("referenceId query parameter is required"))?;

    let records = state
        .store
        .find_config(controller, Some(reference_id))
        .await?;
    Ok(Json(records.into_iter().map(|r| r.config).collect()))
}

async fn update_hub(
    State(state): State<Arc<AppState>>,
    AxPath(hub_id): AxPath<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<HubConfig>> {
    let account = session_account(&headers)?;
    state
        .permissions
        .check(&account, PERM_HUB_UPDATE, &[])?;

    let config: HubConfig = parse_body(body)?;
    if config.id != hub_id {
        return Err(HubError::data("config.id must match the URL").into());
    }
    state.store.update_config(config.clone()).await?;
    Ok(Json(config))
}

async fn get_hub(
    State(state): State<Arc<AppState>>,
    AxPath(hub_id): AxPath<String>,
    headers: HeaderMap,
) -> ApiResult<Json<HubConfig>> {
    let account = session_account(&headers)?;
    state.permissions.check(&account, PERM_HUB_READ, &[])?;

    let record = state.store.get_config(&hub_id).await?;
    Ok(Json(record.config))
}

// ---------------------------------------------------------------------------
// Root capability materialization
// ---------------------------------------------------------------------------

async fn get_root_capability(
    State(state): State<Arc<AppState>>,
    AxPath((hub_id, path)): AxPath<(String, String)>,
) -> ApiResult<Json<Capability>> {
    let record = state.store.get_config(&hub_id).await?;
    let url = format!("{}/zcaps/{path}", hub_url(&state, &hub_id));
    state
        .registry
        .materialize(&url, &record.config)
        .map(Json)
        .ok_or_else(|| HubError::not_found("root capability not found").into())
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

async fn insert_document(
    State(state): State<Arc<AppState>>,
    AxPath(hub_id): AxPath<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Response> {
    let hub = hub_url(&state, &hub_id);
    authorize(
        &state,
        &method,
        &uri,
        &headers,
        true,
        format!("{hub}/documents"),
        format!("{hub}/zcaps/documents"),
        Action::Write,
    )
    .await?;

    let doc: Document = parse_body(body)?;
    let record = state.store.insert(&hub_id, doc).await?;

    let location = format!("{hub}/documents/{}", record.doc.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(record.doc),
    )
        .into_response())
}

async fn update_document(
    State(state): State<Arc<AppState>>,
    AxPath((hub_id, doc_id)): AxPath<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<StatusCode> {
    let hub = hub_url(&state, &hub_id);
    authorize(
        &state,
        &method,
        &uri,
        &headers,
        true,
        format!("{hub}/documents/{doc_id}"),
        format!("{hub}/zcaps/documents/{doc_id}"),
        Action::Write,
    )
    .await?;

    let doc: Document = parse_body(body)?;
    if doc.id != doc_id {
        return Err(HubError::data("document.id must match the URL").into());
    }
    state.store.update(&hub_id, doc).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_document(
    State(state): State<Arc<AppState>>,
    AxPath((hub_id, doc_id)): AxPath<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> ApiResult<Json<Document>> {
    let hub = hub_url(&state, &hub_id);
    authorize(
        &state,
        &method,
        &uri,
        &headers,
        false,
        format!("{hub}/documents/{doc_id}"),
        format!("{hub}/zcaps/documents/{doc_id}"),
        Action::Read,
    )
    .await?;

    let record = state.store.get(&hub_id, &doc_id).await?;
    Ok(Json(record.doc))
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    AxPath((hub_id, doc_id)): AxPath<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let hub = hub_url(&state, &hub_id);
    authorize(
        &state,
        &method,
        &uri,
        &headers,
        false,
        format!("{hub}/documents/{doc_id}"),
        format!("{hub}/zcaps/documents/{doc_id}"),
        Action::Write,
    )
    .await?;

    if state.store.remove(&hub_id, &doc_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(HubError::not_found("document not found").into())
    }
}

// ---------------------------------------------------------------------------
// Blinded queries
// ---------------------------------------------------------------------------

async fn query_hub(
    State(state): State<Arc<AppState>>,
    AxPath(hub_id): AxPath<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<Vec<Document>>> {
    let hub = hub_url(&state, &hub_id);
    authorize(
        &state,
        &method,
        &uri,
        &headers,
        true,
        format!("{hub}/query"),
        format!("{hub}/zcaps/query"),
        Action::Read,
    )
    .await?;

    let query: BlindedQuery = parse_body(body)?;
    let plan = QueryPlan::compile(&query)?;
    let records = state.store.find(&hub_id, &plan).await?;
    Ok(Json(records.into_iter().map(|r| r.doc).collect()))
}

// ---------------------------------------------------------------------------
// Chunks
// ---------------------------------------------------------------------------

async fn update_chunk(
    State(state): State<Arc<AppState>>,
    AxPath((hub_id, doc_id, chunk_index)): AxPath<(String, String, u64)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<StatusCode> {
    let hub = hub_url(&state, &hub_id);
    authorize(
        &state,
        &method,
        &uri,
        &headers,
        true,
        format!("{hub}/documents/{doc_id}"),
        format!("{hub}/zcaps/documents/{doc_id}"),
        Action::Write,
    )
    .await?;

    let chunk: Chunk = parse_body(body)?;
    if chunk.index != chunk_index {
        return Err(HubError::data("chunk.index must match the URL").into());
    }
    state.store.update_chunk(&hub_id, &doc_id, chunk).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_chunk(
    State(state): State<Arc<AppState>>,
    AxPath((hub_id, doc_id, chunk_index)): AxPath<(String, String, u64)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> ApiResult<Json<Chunk>> {
    let hub = hub_url(&state, &hub_id);
    authorize(
        &state,
        &method,
        &uri,
        &headers,
        false,
        format!("{hub}/documents/{doc_id}"),
        format!("{hub}/zcaps/documents/{doc_id}"),
        Action::Read,
    )
    .await?;

    let record = state.store.get_chunk(&hub_id, &doc_id, chunk_index).await?;
    Ok(Json(record.chunk))
}

async fn delete_chunk(
    State(state): State<Arc<AppState>>,
    AxPath((hub_id, doc_id, chunk_index)): AxPath<(String, String, u64)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let hub = hub_url(&state, &hub_id);
    authorize(
        &state,
        &method,
        &uri,
        &headers,
        false,
        format!("{hub}/documents/{doc_id}"),
        format!("{hub}/zcaps/documents/{doc_id}"),
        Action::Write,
    )
    .await?;

    if state.store.remove_chunk(&hub_id, &doc_id, chunk_index).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(HubError::not_found("chunk not found").into())
    }
}

// ---------------------------------------------------------------------------
// Delegated capabilities
// ---------------------------------------------------------------------------

async fn insert_authorization(
    State(state): State<Arc<AppState>>,
    AxPath(hub_id): AxPath<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<StatusCode> {
    let hub = hub_url(&state, &hub_id);
    authorize(
        &state,
        &method,
        &uri,
        &headers,
        true,
        format!("{hub}/authorizations"),
        format!("{hub}/zcaps/authorizations"),
        Action::Write,
    )
    .await?;

    let capability: Capability = parse_body(body)?;
    let record = state.store.get_config(&hub_id).await?;
    verify_delegation(
        &capability,
        &record.config,
        &hub,
        state.resolver.as_ref() as &dyn KeyResolver,
    )?;

    // The holder the capability is stored for: its invoker, falling back to
    // its controller.
    let holder = capability
        .invoker
        .as_ref()
        .and_then(|i| i.values().first().map(|s| (*s).to_owned()))
        .or_else(|| capability.controller.clone())
        .ok_or_else(|| HubError::data("capability must name an invoker"))?;

    state.delegations.insert(&holder, capability).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_authorizations(
    State(state): State<Arc<AppState>>,
    AxPath(hub_id): AxPath<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let hub = hub_url(&state, &hub_id);
    let invoker = authorize(
        &state,
        &method,
        &uri,
        &headers,
        false,
        format!("{hub}/authorizations"),
        format!("{hub}/zcaps/authorizations"),
        Action::Read,
    )
    .await?;

    match params.get("id") {
        Some(capability_id) => {
            let capability = state
                .delegations
                .get_by_id(capability_id)
                .await
                .filter(|c| c.invocation_target.starts_with(&format!("{hub}/")))
                .ok_or_else(|| HubError::not_found("authorization not found"))?;
            Ok(Json(capability).into_response())
        }
        None => {
            let capabilities: Vec<Capability> = state
                .delegations
                .find_by_controller(&invoker.id)
                .await
                .into_iter()
                .filter(|c| c.invocation_target.starts_with(&format!("{hub}/")))
                .collect();
            Ok(Json(capabilities).into_response())
        }
    }
}

async fn delete_authorization(
    State(state): State<Arc<AppState>>,
    AxPath(hub_id): AxPath<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<StatusCode> {
    let hub = hub_url(&state, &hub_id);
    let invoker = authorize(
        &state,
        &method,
        &uri,
        &headers,
        false,
        format!("{hub}/authorizations"),
        format!("{hub}/zcaps/authorizations"),
        Action::Write,
    )
    .await?;

    let capability_id = params
        .get("id")
        .ok_or_else(|| HubError::data("id query parameter is required"))?;

    // Only current root delegators may revoke stored delegations.
    let record = state.store.get_config(&hub_id).await?;
    if !record
        .config
        .root_delegators()
        .iter()
        .any(|d| *d == invoker.id)
    {
        return Err(HubError::not_allowed().into());
    }

    // Never reach across hubs: the capability must target this hub.
    let in_hub = state
        .delegations
        .get_by_id(capability_id)
        .await
        .is_some_and(|c| c.invocation_target.starts_with(&format!("{hub}/")));
    if in_hub && state.delegations.remove(capability_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(HubError::not_found("authorization not found").into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let mut config = ServerConfig::default();
        config
            .accounts
            .insert("acct-1".into(), vec![
                PERM_HUB_CREATE.into(),
                PERM_HUB_READ.into(),
                PERM_HUB_UPDATE.into(),
            ]);
        build_state(config)
    }

    fn config_body() -> serde_json::Value {
        serde_json::json!({
            "sequence": 0,
            "controller": "did:key:zCtrl",
            "keyAgreementKey": {"id": "did:key:zKak#zKak", "type": "X25519KeyAgreementKey2019"},
            "hmac": {"id": "did:key:zHmac#zHmac", "type": "Sha256HmacKey2019"}
        })
    }

    #[tokio::test]
    async fn create_hub_requires_session_account() {
        let app = build_app(test_state());
        let resp = app
            .oneshot(
                Request::post("/data-hubs")
                    .header("content-type", "application/json")
                    .body(Body::from(config_body().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn create_hub_mints_identifier_and_location() {
        let app = build_app(test_state());
        let resp = app
            .oneshot(
                Request::post("/data-hubs")
                    .header("content-type", "application/json")
                    .header("x-account-id", "acct-1")
                    .body(Body::from(config_body().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let location = resp.headers().get(header::LOCATION).unwrap();
        assert!(location.to_str().unwrap().contains("/data-hubs/z"));
    }

    #[tokio::test]
    async fn create_hub_with_nonzero_sequence_is_data_error() {
        let app = build_app(test_state());
        let mut body = config_body();
        body["sequence"] = serde_json::json!(1);
        let resp = app
            .oneshot(
                Request::post("/data-hubs")
                    .header("content-type", "application/json")
                    .header("x-account-id", "acct-1")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_hubs_requires_both_query_params() {
        let app = build_app(test_state());
        let resp = app
            .oneshot(
                Request::get("/data-hubs?controller=did:key:zCtrl")
                    .header("x-account-id", "acct-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_zcap_suffix_is_not_found() {
        let state = test_state();
        let app = build_app(state.clone());

        // Create a hub first so the config lookup succeeds.
        let resp = app
            .clone()
            .oneshot(
                Request::post("/data-hubs")
                    .header("content-type", "application/json")
                    .header("x-account-id", "acct-1")
                    .body(Body::from(config_body().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let location = resp
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();
        let hub_id = location.rsplit('/').next().unwrap().to_owned();

        let resp = app
            .oneshot(
                Request::get(format!("/data-hubs/{hub_id}/zcaps/chunks"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unsigned_document_request_is_rejected() {
        let app = build_app(test_state());
        let resp = app
            .oneshot(
                Request::get("/data-hubs/zHub/documents/zDoc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        // Authorization failures are uniform 400s.
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
