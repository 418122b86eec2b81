use asis_core::collaborator::SessionKey;
use asis_core::policy::{ConsentInput, RetentionPolicy};
use asis_core::report::DeletionScope;
use asis_core::types::{Role, SessionId};
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, Extensions, HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/sessions", post(new_session))
        .route("/api/v1/sessions/{id}/privacy", post(set_privacy).get(get_privacy))
        .route("/api/v1/sessions/{id}/messages", post(post_message).get(get_messages))
        .route("/api/v1/sessions/{id}/data", delete(delete_data))
        .route("/api/v1/sessions/{id}/export", get(export))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let manager = &state.manager;
    Json(json!({
        "status": "healthy",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "bound_sessions": manager.registry().len(),
        "ring_sessions": manager.ring().session_count(),
        "ttl_sessions": manager.ttl().session_count(),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NewSessionRequest {
    previous: Option<String>,
}

async fn new_session(
    State(state): State<AppState>,
    Json(req): Json<NewSessionRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let previous = req.previous.map(SessionId::from);
    let result = state.manager.start_new_session(previous.as_ref()).await;
    // Same rule as delete_data: the key goes even when a collaborator failed.
    if let Some(previous) = &previous {
        state.keys.remove(previous);
    }
    let session = result?;
    Ok((StatusCode::CREATED, Json(json!({ "session_id": session }))))
}

#[derive(Debug, Deserialize)]
struct PrivacyRequest {
    mode: String,
    #[serde(default)]
    consent: ConsentInput,
    /// Secret for the encrypted tier.
    #[serde(default)]
    key: Option<String>,
}

async fn set_privacy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    extensions: Extensions,
    Json(req): Json<PrivacyRequest>,
) -> ApiResult<Json<Value>> {
    let session = SessionId::from(id);
    let mut consent = req.consent;
    if consent.caller_address.is_none() {
        // Present when served with `into_make_service_with_connect_info`.
        consent.caller_address = extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
    }
    if consent.client_signature.is_none() {
        consent.client_signature = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
    }
    let binding = state.manager.set_choice(&session, &req.mode, &consent)?;
    if binding.policy == RetentionPolicy::Encrypted {
        if let Some(secret) = req.key.filter(|k| !k.is_empty()) {
            state.keys.insert(session.clone(), SessionKey::new(secret));
        }
    }
    info!(session = %session.short(), policy = %binding.policy, "privacy choice recorded");
    Ok(Json(json!({
        "session_id": session,
        "policy": binding.policy,
        "consent": binding.consent,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusQuery {
    /// Answer 404 instead of the `ephemeral` default when no choice was made.
    strict: bool,
}

async fn get_privacy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<StatusQuery>,
) -> ApiResult<Json<Value>> {
    let session = SessionId::from(id);
    if q.strict {
        state.manager.registry().require(&session)?;
    }
    Ok(Json(json!(state.manager.status(&session))))
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    #[serde(default = "default_role")]
    role: Role,
    content: String,
}

fn default_role() -> Role {
    Role::User
}

async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::bad_request("Message content is required"));
    }
    let session = SessionId::from(id);
    let (tier, crisis) = state.manager.store_classified(&session, req.role, content).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "session_id": session, "tier": tier, "crisis": crisis })),
    ))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> ApiResult<Json<Value>> {
    let session = SessionId::from(id);
    let limit = q.limit.unwrap_or_else(|| state.manager.default_history_limit());
    let messages = state.manager.history(&session, limit).await?;
    Ok(Json(json!({ "session_id": session, "messages": messages })))
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    #[serde(default)]
    scope: DeletionScope,
}

async fn delete_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<DeleteQuery>,
) -> ApiResult<Json<Value>> {
    let session = SessionId::from(id);
    let result = state.manager.delete_data(&session, q.scope).await;
    // The key goes with the data even when a collaborator failed.
    state.keys.remove(&session);
    let report = result?;
    Ok(Json(json!(report)))
}

async fn export(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let snapshot = state.manager.export_data(&SessionId::from(id)).await?;
    Ok(Json(json!(snapshot)))
}
