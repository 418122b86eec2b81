use crate::error::ApiError;
use crate::state::AppState;
use crate::*;
use asis_core::clock::ManualClock;
use asis_core::collaborator::KeyResolver;
use asis_core::config::LifecycleConfig;
use asis_core::error::LifecycleError;
use asis_core::types::SessionId;
use asis_session::{LifecycleManager, MemoryDurableStore, MemoryEncryptedStore, MemoryKeyResolver, RecordingDeleter};
use axum::extract::ConnectInfo;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> Router {
    app_with_state(AppState::in_memory(&LifecycleConfig::default()).unwrap())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

async fn choose(app: &Router, id: &str, mode: &str) -> (StatusCode, Value) {
    send(app, "POST", &format!("/api/v1/sessions/{id}/privacy"), Some(json!({ "mode": mode, "consent": { "explicit": true } }))).await
}

async fn say(app: &Router, id: &str, content: &str) -> (StatusCode, Value) {
    send(app, "POST", &format!("/api/v1/sessions/{id}/messages"), Some(json!({ "content": content }))).await
}

// ========== Health ==========

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["bound_sessions"], 0);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = test_app();
    let (status, _) = send(&app, "GET", "/api/v1/nothing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ========== Sessions ==========

#[tokio::test]
async fn test_new_session() {
    let app = test_app();
    let (status, body) = send(&app, "POST", "/api/v1/sessions", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["session_id"].as_str().unwrap().len(), 36);
}

#[tokio::test]
async fn test_new_session_retires_previous() {
    let app = test_app();
    choose(&app, "old", "temporary").await;
    say(&app, "old", "hello").await;

    let (status, body) = send(&app, "POST", "/api/v1/sessions", Some(json!({ "previous": "old" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(body["session_id"], "old");

    let (_, privacy) = send(&app, "GET", "/api/v1/sessions/old/privacy", None).await;
    assert_eq!(privacy["policy"], Value::Null);
    assert_eq!(privacy["stored_messages"], 0);
}

#[tokio::test]
async fn test_new_session_drops_key_even_when_retirement_fails() {
    let keys = Arc::new(MemoryKeyResolver::new());
    let encrypted = Arc::new(MemoryEncryptedStore::new());
    let manager = LifecycleManager::builder().encrypted(encrypted.clone(), keys.clone()).build();
    let app = app_with_state(AppState::new(Arc::new(manager), keys.clone()));
    send(&app, "POST", "/api/v1/sessions/old/privacy", Some(json!({ "mode": "encrypted", "key": "k1" }))).await;
    say(&app, "old", "secret").await;
    encrypted.set_offline(true);

    let (status, body) = send(&app, "POST", "/api/v1/sessions", Some(json!({ "previous": "old" }))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["failed"], json!(["encrypted"]));
    assert!(keys.resolve(&SessionId::from("old")).is_none());
}

// ========== Privacy ==========

#[tokio::test]
async fn test_invalid_mode_rejected() {
    let app = test_app();
    choose(&app, "s1", "temporary").await;
    let (status, body) = choose(&app, "s1", "Forever").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_mode");

    let (_, privacy) = send(&app, "GET", "/api/v1/sessions/s1/privacy", None).await;
    assert_eq!(privacy["policy"], "temporary");
}

#[tokio::test]
async fn test_unbound_privacy_status() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/api/v1/sessions/fresh/privacy", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["policy"], Value::Null);
    assert_eq!(body["effective_policy"], "ephemeral");
    assert_eq!(body["tier"], "ring");
}

#[tokio::test]
async fn test_user_agent_stored_as_hash() {
    let app = test_app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/sessions/s1/privacy")
        .header("content-type", "application/json")
        .header("user-agent", "test-browser/1.0")
        .body(Body::from(json!({ "mode": "ephemeral", "consent": { "explicit": true } }).to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    let hash = body["consent"]["client_signature_hash"].as_str().unwrap();
    assert_eq!(hash.len(), 64);
    assert!(!body.to_string().contains("test-browser"));
}

#[tokio::test]
async fn test_peer_address_stored_as_hash() {
    let app = test_app();
    let mut req = Request::builder()
        .method("POST")
        .uri("/api/v1/sessions/s1/privacy")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "mode": "temporary", "consent": { "explicit": true } }).to_string()))
        .unwrap();
    req.extensions_mut().insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 4000))));
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body["consent"]["address_hash"].as_str().unwrap().len(), 64);
    assert!(!body.to_string().contains("10.0.0.7"));
}

#[tokio::test]
async fn test_explicit_address_wins_over_peer() {
    let app = test_app();
    let mut req = Request::builder()
        .method("POST")
        .uri("/api/v1/sessions/s1/privacy")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "mode": "temporary", "consent": { "explicit": true, "caller_address": "192.0.2.1" } }).to_string(),
        ))
        .unwrap();
    req.extensions_mut().insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 4000))));
    let with_peer: Value = {
        let resp = app.clone().oneshot(req).await.unwrap();
        serde_json::from_slice(&resp.into_body().collect().await.unwrap().to_bytes()).unwrap()
    };
    let (_, without_peer) = send(
        &app,
        "POST",
        "/api/v1/sessions/s2/privacy",
        Some(json!({ "mode": "temporary", "consent": { "explicit": true, "caller_address": "192.0.2.1" } })),
    )
    .await;
    assert_eq!(with_peer["consent"]["address_hash"], without_peer["consent"]["address_hash"]);
}

#[tokio::test]
async fn test_strict_privacy_status_requires_choice() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/api/v1/sessions/fresh/privacy?strict=true", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "no_session");

    choose(&app, "fresh", "ephemeral").await;
    let (status, body) = send(&app, "GET", "/api/v1/sessions/fresh/privacy?strict=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["policy"], "ephemeral");
}

// ========== Messages ==========

#[tokio::test]
async fn test_temporary_history_with_limit() {
    let app = test_app();
    let (status, body) = choose(&app, "t1", "temporary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["policy"], "temporary");

    for text in ["one", "two", "three"] {
        let (status, body) = say(&app, "t1", text).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["tier"], "ttl");
    }
    let (status, body) = send(&app, "GET", "/api/v1/sessions/t1/messages?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "two");
    assert_eq!(messages[1]["content"], "three");
}

#[tokio::test]
async fn test_temporary_history_expires() {
    let clock = Arc::new(ManualClock::starting_now());
    let manager = LifecycleManager::builder().clock(clock.clone()).build();
    let app = app_with_state(AppState::new(Arc::new(manager), Arc::new(MemoryKeyResolver::new())));

    choose(&app, "t1", "temporary").await;
    say(&app, "t1", "short lived").await;
    clock.advance(chrono::Duration::hours(25));

    let (status, body) = send(&app, "GET", "/api/v1/sessions/t1/messages", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_message_rejected() {
    let app = test_app();
    let (status, body) = say(&app, "s1", "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_crisis_message_flagged() {
    let app = test_app();
    let (status, body) = say(&app, "s1", "Už nevládzem ďalej").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["crisis"], true);
    say(&app, "s1", "thanks for listening").await;

    let (_, privacy) = send(&app, "GET", "/api/v1/sessions/s1/privacy", None).await;
    assert_eq!(privacy["stored_messages"], 2);
    assert_eq!(privacy["crisis_messages"], 1);
    assert_eq!(privacy["crisis_events"], 1);

    let (_, export) = send(&app, "GET", "/api/v1/sessions/s1/export", None).await;
    let events = export["crisis_events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0]["signals"].as_array().unwrap().contains(&json!("nevladzem dalej")));

    let (_, report) = send(&app, "DELETE", "/api/v1/sessions/s1/data", None).await;
    assert_eq!(report["crisis_events_removed"], 1);
    let (_, export) = send(&app, "GET", "/api/v1/sessions/s1/export", None).await;
    assert!(export["crisis_events"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_encrypted_needs_key() {
    let app = test_app();
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/sessions/e1/privacy",
        Some(json!({ "mode": "encrypted", "key": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = say(&app, "e1", "private").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["tier"], "encrypted");

    choose(&app, "e2", "encrypted").await;
    let (status, body) = say(&app, "e2", "private").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "collaborator_unavailable");
    assert_eq!(body["error"]["collaborator"], "encrypted");
}

#[tokio::test]
async fn test_durable_outage_is_503() {
    let durable = Arc::new(MemoryDurableStore::new());
    let manager = LifecycleManager::builder().durable(durable.clone()).build();
    let app = app_with_state(AppState::new(Arc::new(manager), Arc::new(MemoryKeyResolver::new())));

    choose(&app, "p1", "persistent").await;
    let (status, _) = say(&app, "p1", "kept").await;
    assert_eq!(status, StatusCode::CREATED);

    durable.set_offline(true);
    let (status, _) = send(&app, "GET", "/api/v1/sessions/p1/messages", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (status, _) = send(&app, "GET", "/api/v1/sessions/p1/export", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// ========== Deletion & Export ==========

#[tokio::test]
async fn test_delete_session_data() {
    let app = test_app();
    for i in 0..4 {
        say(&app, "d1", &format!("m{i}")).await;
    }
    let (status, body) = send(&app, "DELETE", "/api/v1/sessions/d1/data", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages_removed"], 4);
    assert_eq!(body["scope"], "session");

    let (_, history) = send(&app, "GET", "/api/v1/sessions/d1/messages", None).await;
    assert!(history["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_everything_partial_failure() {
    let manager = LifecycleManager::builder()
        .auxiliary(Arc::new(RecordingDeleter::new("logs")))
        .auxiliary(Arc::new(RecordingDeleter::failing("backups")))
        .build();
    let app = app_with_state(AppState::new(Arc::new(manager), Arc::new(MemoryKeyResolver::new())));
    choose(&app, "d1", "temporary").await;
    say(&app, "d1", "hello").await;

    let (status, body) = send(&app, "DELETE", "/api/v1/sessions/d1/data?scope=everything", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "partial_deletion");
    assert_eq!(body["error"]["failed"], json!(["backups"]));
    assert_eq!(body["error"]["report"]["auxiliary"], json!(["logs"]));
    assert_eq!(body["error"]["report"]["policy_cleared"], true);

    let (_, privacy) = send(&app, "GET", "/api/v1/sessions/d1/privacy", None).await;
    assert_eq!(privacy["policy"], Value::Null);
}

#[tokio::test]
async fn test_bad_scope_rejected() {
    let app = test_app();
    let (status, _) = send(&app, "DELETE", "/api/v1/sessions/d1/data?scope=galaxy", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_export_unbound_session() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/api/v1/sessions/x1/export", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["policy"], "ephemeral");
    assert_eq!(body["policy_bound"], false);
    assert_eq!(body["consent"], Value::Null);
    assert!(body["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_export_bound_session() {
    let app = test_app();
    choose(&app, "x1", "persistent").await;
    say(&app, "x1", "remember this").await;
    let (status, body) = send(&app, "GET", "/api/v1/sessions/x1/export", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["policy"], "persistent");
    assert_eq!(body["policy_bound"], true);
    assert_eq!(body["consent"]["explicit"], true);
    assert_eq!(body["history"][0]["content"], "remember this");
    assert_eq!(body["history"][0]["role"], "user");
}

// ========== Error Mapping ==========

#[tokio::test]
async fn test_no_session_maps_to_404() {
    let err = ApiError::from(LifecycleError::NoSession(SessionId::from("gone")));
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "no_session");
}

#[test]
fn test_config_error_maps_to_500() {
    let err = ApiError::from(LifecycleError::InvalidConfig("bad".into()));
    assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.code, "internal_error");
}
