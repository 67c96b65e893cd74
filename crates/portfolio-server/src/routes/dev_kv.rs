//! Key-value browser for local development.
//!
//! Every endpoint is refused outside a local context (403) before any
//! parameter is looked at. Endpoints other than the viewer page are also
//! refused while the store runs on its in-memory fallback (503).
//!
//! Endpoints:
//! - `GET /dev/kv`: HTML viewer
//! - `GET /dev/kv/browse?prefix&limit&cursor`: entries under a prefix
//! - `GET|DELETE /dev/kv/entry?key`, `POST /dev/kv/entry`: single keys
//! - `GET /dev/kv/stats`: keyspace summary

use axum::extract::Request;
use axum::response::{Html, IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use portfolio_core::AppStats;
use portfolio_store::{KeyPart, KvEntry, KvKey};

use crate::error::{ApiError, ApiResult};
use crate::router::RouteGroup;
use crate::routes::{query, read_json, success};
use crate::state::AppState;

/// Default number of entries per browse page.
pub const DEFAULT_BROWSE_LIMIT: usize = 100;

const VIEWER_HTML: &str = include_str!("../../assets/kv_viewer.html");

/// Build the KV browser routes.
pub fn routes(state: &AppState) -> RouteGroup {
    RouteGroup::new("/dev/kv")
        .get("", state.bind(viewer))
        .get("/browse", state.bind(browse))
        .get("/entry", state.bind(get_entry))
        .post("/entry", state.bind(set_entry))
        .delete("/entry", state.bind(delete_entry))
        .get("/stats", state.bind(stats))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct BrowseParams {
    prefix: Option<String>,
    limit: Option<usize>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyParams {
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SetEntryRequest {
    #[serde(default)]
    key: Value,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrowseResponse {
    entries: Vec<KvEntry>,
    cursor: Option<String>,
    count: usize,
    has_more: bool,
    prefix: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KvStatsResponse {
    total_entries: u64,
    available_prefixes: Vec<String>,
    application_stats: AppStats,
    environment: &'static str,
    kv_type: &'static str,
}

/// Key from a query parameter; required and non-empty.
fn key_param(req: &Request) -> ApiResult<KvKey> {
    let params: KeyParams = query(req)?;
    let raw = params
        .key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Key parameter is required".to_string()))?;
    non_empty(KvKey::parse(&raw)?)
}

/// Key from a JSON body: an array of parts or a textual key.
fn key_from_json(key: Value) -> ApiResult<KvKey> {
    let key = match key {
        Value::Null => return Err(ApiError::BadRequest("Key is required".to_string())),
        Value::Array(_) => serde_json::from_value::<Vec<KeyPart>>(key)
            .map(KvKey::from_parts)
            .map_err(|e| ApiError::BadRequest(format!("invalid key: {}", e)))?,
        Value::String(text) => KvKey::parse(&text)?,
        _ => {
            return Err(ApiError::BadRequest(
                "Key must be a string or array".to_string(),
            ));
        }
    };
    non_empty(key)
}

fn non_empty(key: KvKey) -> ApiResult<KvKey> {
    if key.is_empty() {
        Err(ApiError::BadRequest("Key must not be empty".to_string()))
    } else {
        Ok(key)
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /dev/kv - The viewer page.
async fn viewer(state: AppState, _req: Request) -> ApiResult<Response> {
    state.store().ensure_local()?;
    Ok(Html(VIEWER_HTML).into_response())
}

/// GET /dev/kv/browse - Entries under a prefix, in key order.
async fn browse(state: AppState, req: Request) -> ApiResult<Response> {
    let raw = state.store().raw()?;
    let params: BrowseParams = query(&req)?;

    let prefix_text = params.prefix.unwrap_or_default();
    let prefix = KvKey::parse(&prefix_text)?;
    let page = raw.list(
        &prefix,
        params.limit.unwrap_or(DEFAULT_BROWSE_LIMIT),
        params.cursor.as_deref().filter(|c| !c.is_empty()),
    )?;

    success(
        "Success",
        BrowseResponse {
            count: page.items.len(),
            has_more: page.cursor.is_some(),
            entries: page.items,
            cursor: page.cursor,
            prefix: if prefix_text.trim().is_empty() {
                "root".to_string()
            } else {
                prefix_text
            },
        },
    )
}

/// GET /dev/kv/entry?key - One entry.
async fn get_entry(state: AppState, req: Request) -> ApiResult<Response> {
    let raw = state.store().raw()?;
    let key = key_param(&req)?;
    let entry = raw
        .get(&key)?
        .ok_or_else(|| ApiError::NotFound("Key not found".to_string()))?;
    success("Success", entry)
}

/// POST /dev/kv/entry - Write an arbitrary JSON value.
async fn set_entry(state: AppState, req: Request) -> ApiResult<Response> {
    let raw = state.store().raw()?;
    let body: SetEntryRequest = read_json(req).await?;
    let key = key_from_json(body.key)?;

    raw.set(&key, &body.value).await?;
    tracing::info!(key = %key, "KV entry written");
    success(
        "Success",
        json!({ "key": key, "value": body.value, "ok": true }),
    )
}

/// DELETE /dev/kv/entry?key - Remove a key.
async fn delete_entry(state: AppState, req: Request) -> ApiResult<Response> {
    let raw = state.store().raw()?;
    let key = key_param(&req)?;
    let existed = raw.delete(&key).await?;
    tracing::info!(key = %key, existed, "KV entry deleted");
    success(
        "Success",
        json!({ "key": key, "deleted": true, "existed": existed }),
    )
}

/// GET /dev/kv/stats - Keyspace summary plus record counts.
async fn stats(state: AppState, _req: Request) -> ApiResult<Response> {
    let raw = state.store().raw()?;
    let keyspace = raw.stats()?;
    success(
        "Success",
        KvStatsResponse {
            total_entries: keyspace.total_entries,
            available_prefixes: keyspace.available_prefixes,
            application_stats: state.store().get_stats()?,
            environment: state.config().environment(),
            kv_type: "sled",
        },
    )
}
