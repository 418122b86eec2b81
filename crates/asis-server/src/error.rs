//! JSON error responses for the HTTP API.

use asis_core::error::LifecycleError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};

/// API error with status code and message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    /// Extra fields merged into the `error` object.
    pub details: Map<String, Value>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, msg: impl Into<String>) -> Self {
        Self { status, code, message: msg.into(), details: Map::new() }
    }
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", msg)
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = self.details;
        error.insert("code".into(), json!(self.code));
        error.insert("message".into(), json!(self.message));
        (self.status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        let message = err.to_string();
        match err {
            LifecycleError::InvalidMode(_) => Self::new(StatusCode::BAD_REQUEST, "invalid_mode", message),
            LifecycleError::NoSession(_) => Self::new(StatusCode::NOT_FOUND, "no_session", message),
            LifecycleError::CollaboratorUnavailable { collaborator, .. } => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "collaborator_unavailable", message)
                    .with_detail("collaborator", json!(collaborator))
            }
            LifecycleError::PartialDeletion { failed, report } => {
                Self::new(StatusCode::BAD_GATEWAY, "partial_deletion", message)
                    .with_detail("failed", json!(failed))
                    .with_detail("report", serde_json::to_value(&*report).unwrap_or(Value::Null))
            }
            _ => Self::internal(message),
        }
    }
}
