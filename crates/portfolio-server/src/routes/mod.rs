//! Route groups and shared controller helpers.

pub mod admin;
pub mod api;
pub mod dev_kv;
pub mod hot_reload;
pub mod pages;
pub mod webhooks;

use std::path::Path;

use axum::Json;
use axum::extract::{Query, Request};
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};
use crate::middleware::{Cors, RequestLogger};
use crate::notify::Notification;
use crate::router::Router;
use crate::state::AppState;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the router with all route groups and the standing middleware.
pub fn build_router(state: &AppState) -> Router {
    let mut router = Router::new();
    router
        .add_middleware(RequestLogger)
        .add_middleware(Cors)
        .add_group(pages::routes(state))
        .add_group(api::routes(state))
        .add_group(admin::routes(state))
        .add_group(webhooks::routes(state))
        .add_group(dev_kv::routes(state))
        .add_group(hot_reload::routes(state));
    router
}

// ============================================================================
// Responses
// ============================================================================

/// `{"success": true, "message": ..., ...data}` with status 200.
///
/// Object fields of `data` are merged into the top level; any other value
/// lands under `"data"`.
pub fn success(message: &str, data: impl Serialize) -> ApiResult<Response> {
    let mut body = match serde_json::to_value(data).map_err(|e| ApiError::Internal(e.to_string()))? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };
    body.insert("success".to_string(), Value::Bool(true));
    body.insert("message".to_string(), Value::String(message.to_string()));
    Ok(Json(Value::Object(body)).into_response())
}

/// Read a file under the content directory.
pub async fn read_content(state: &AppState, relative: impl AsRef<Path>) -> ApiResult<String> {
    let path = state.config().content_dir.join(relative);
    tokio::fs::read_to_string(&path).await.map_err(|e| {
        ApiError::Internal(format!("failed to read {}: {}", path.display(), e))
    })
}

// ============================================================================
// Request Parsing
// ============================================================================

/// Parse the request body as JSON. Malformed bodies are a bad request.
pub async fn read_json<T: DeserializeOwned>(req: Request) -> ApiResult<T> {
    let bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::BadRequest(format!("could not read body: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))
}

/// Parse the query string.
pub fn query<T: DeserializeOwned>(req: &Request) -> ApiResult<T> {
    Query::<T>::try_from_uri(req.uri())
        .map(|Query(params)| params)
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Header value as text, if present and valid UTF-8.
pub fn header_text(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Best-effort client address: first `x-forwarded-for` entry, then
/// `x-real-ip`, then `cf-connecting-ip`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .or_else(|| headers.get("cf-connecting-ip").and_then(|v| v.to_str().ok()))
        .map(str::to_string)
}

// ============================================================================
// Notifications
// ============================================================================

/// Send a notification if a notifier is configured. Returns whether it
/// was delivered; failures are logged and never propagated.
pub async fn notify_owner(state: &AppState, notification: Notification) -> bool {
    let Some(notifier) = state.notifier() else {
        tracing::debug!("No notifier configured, skipping notification");
        return false;
    };
    match notifier.notify(&notification).await {
        Ok(()) => true,
        Err(error) => {
            tracing::error!(%error, "Failed to send notification");
            false
        }
    }
}
