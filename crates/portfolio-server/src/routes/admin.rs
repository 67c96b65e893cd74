//! Admin endpoints for reading stored emails and contact messages.
//!
//! Every endpoint requires `Authorization: Bearer <ADMIN_API_KEY>`. When no
//! key is configured all admin requests are rejected.
//!
//! Endpoints:
//! - `GET /api/admin/emails`, `/api/admin/contacts`: listing or search
//! - `GET /api/admin/emails/:id`, `/api/admin/contacts/:id`: lookup
//! - `GET /api/admin/stats`: record counts
//! - `GET /api/admin/export`: full JSON dump as an attachment

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use http::header;
use serde::{Deserialize, Serialize};

use portfolio_core::{AppStats, ContactMessage, EmailMessage};
use portfolio_store::{DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_LIMIT};

use crate::error::{ApiError, ApiResult};
use crate::router::{PathParams, RouteGroup};
use crate::routes::{bearer_token, query, success};
use crate::state::AppState;

/// Export format version.
pub const EXPORT_VERSION: &str = "1.0";

/// Build the admin routes.
pub fn routes(state: &AppState) -> RouteGroup {
    RouteGroup::new("/api/admin")
        .get("/emails", state.bind(list_emails))
        .get("/emails/:id", state.bind(get_email))
        .get("/contacts", state.bind(list_contacts))
        .get("/contacts/:id", state.bind(get_contact))
        .get("/stats", state.bind(get_stats))
        .get("/export", state.bind(export_data))
}

/// Reject the request unless it carries the configured admin key.
fn require_admin(state: &AppState, req: &Request) -> ApiResult<()> {
    let Some(expected) = state.config().admin_api_key.as_deref() else {
        tracing::warn!("Admin request rejected: ADMIN_API_KEY is not configured");
        return Err(ApiError::Unauthorized("admin access is not configured".to_string()));
    };
    if bearer_token(req.headers()) == Some(expected) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("invalid admin credentials".to_string()))
    }
}

fn path_id(req: &Request) -> ApiResult<String> {
    req.extensions()
        .get::<PathParams>()
        .and_then(|params| params.get("id"))
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("id is required".to_string()))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Page size; defaults to 50 for listings and 20 for searches.
    pub limit: Option<usize>,
    /// Cursor from a previous page.
    pub cursor: Option<String>,
    /// Substring search over the most recent records.
    pub search: Option<String>,
}

impl ListParams {
    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Serialize)]
struct EmailList {
    emails: Vec<EmailMessage>,
    cursor: Option<String>,
}

#[derive(Debug, Serialize)]
struct ContactList {
    contacts: Vec<ContactMessage>,
    cursor: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(flatten)]
    stats: AppStats,
    last_updated: String,
}

/// Body of the export download.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub exported_at: String,
    pub version: &'static str,
    pub data: ExportData,
    pub statistics: AppStats,
}

#[derive(Debug, Serialize)]
pub struct ExportData {
    pub emails: Vec<EmailMessage>,
    pub contacts: Vec<ContactMessage>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /api/admin/emails - List or search emails, newest first.
async fn list_emails(state: AppState, req: Request) -> ApiResult<Response> {
    require_admin(&state, &req)?;
    let params: ListParams = query(&req)?;
    let store = state.store();

    let list = match params.search_term() {
        Some(term) => EmailList {
            emails: store.search_emails(term, params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))?,
            cursor: None,
        },
        None => {
            let page =
                store.list_emails(params.limit.unwrap_or(DEFAULT_PAGE_SIZE), params.cursor())?;
            EmailList {
                emails: page.items,
                cursor: page.cursor,
            }
        }
    };
    success("Success", list)
}

/// GET /api/admin/emails/:id - One email.
async fn get_email(state: AppState, req: Request) -> ApiResult<Response> {
    require_admin(&state, &req)?;
    let id = path_id(&req)?;
    let email = state
        .store()
        .get_email(&id)?
        .ok_or_else(|| ApiError::NotFound("Email not found".to_string()))?;
    success("Success", serde_json::json!({ "email": email }))
}

/// GET /api/admin/contacts - List or search contact messages, newest first.
async fn list_contacts(state: AppState, req: Request) -> ApiResult<Response> {
    require_admin(&state, &req)?;
    let params: ListParams = query(&req)?;
    let store = state.store();

    let list = match params.search_term() {
        Some(term) => ContactList {
            contacts: store.search_contacts(term, params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT))?,
            cursor: None,
        },
        None => {
            let page =
                store.list_contacts(params.limit.unwrap_or(DEFAULT_PAGE_SIZE), params.cursor())?;
            ContactList {
                contacts: page.items,
                cursor: page.cursor,
            }
        }
    };
    success("Success", list)
}

/// GET /api/admin/contacts/:id - One contact message.
async fn get_contact(state: AppState, req: Request) -> ApiResult<Response> {
    require_admin(&state, &req)?;
    let id = path_id(&req)?;
    let contact = state
        .store()
        .get_contact(&id)?
        .ok_or_else(|| ApiError::NotFound("Contact message not found".to_string()))?;
    success("Success", serde_json::json!({ "contact": contact }))
}

/// GET /api/admin/stats - Record counts.
async fn get_stats(state: AppState, req: Request) -> ApiResult<Response> {
    require_admin(&state, &req)?;
    let stats = state.store().get_stats()?;
    success(
        "Success",
        StatsResponse {
            stats,
            last_updated: Utc::now().to_rfc3339(),
        },
    )
}

/// GET /api/admin/export - Every record as a pretty-printed attachment.
async fn export_data(state: AppState, req: Request) -> ApiResult<Response> {
    require_admin(&state, &req)?;
    let store = state.store();
    let now = Utc::now();

    let document = ExportDocument {
        exported_at: now.to_rfc3339(),
        version: EXPORT_VERSION,
        data: ExportData {
            emails: store.all_emails()?,
            contacts: store.all_contacts()?,
        },
        statistics: store.get_stats()?,
    };
    let body = serde_json::to_string_pretty(&document)
        .map_err(|e| ApiError::Internal(format!("failed to serialize export: {}", e)))?;
    let disposition = format!(
        "attachment; filename=\"portfolio-data-{}.json\"",
        now.format("%Y-%m-%d")
    );

    tracing::info!(
        emails = document.data.emails.len(),
        contacts = document.data.contacts.len(),
        "Exported data"
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::sync::Arc;

    use portfolio_store::KvStore;

    use crate::config::ServerConfig;

    fn state(admin_key: Option<&str>) -> AppState {
        let config = ServerConfig {
            admin_api_key: admin_key.map(str::to_string),
            ..ServerConfig::default()
        };
        AppState::new(Arc::new(KvStore::memory(true)), config)
    }

    fn request(auth: Option<&str>) -> Request {
        let mut builder = http::Request::get("/api/admin/stats");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_admin_requires_exact_bearer_key() {
        let state = state(Some("k3y"));
        assert!(require_admin(&state, &request(Some("Bearer k3y"))).is_ok());
        assert!(require_admin(&state, &request(None)).is_err());
        assert!(require_admin(&state, &request(Some("Bearer wrong"))).is_err());
        assert!(require_admin(&state, &request(Some("k3y"))).is_err());
        assert!(require_admin(&state, &request(Some("Bearer k3y "))).is_err());
    }

    #[test]
    fn test_admin_closed_without_configured_key() {
        let state = state(None);
        assert!(matches!(
            require_admin(&state, &request(Some("Bearer anything"))),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_list_params_ignore_blank_values() {
        let params = ListParams {
            limit: None,
            cursor: Some(String::new()),
            search: Some("   ".to_string()),
        };
        assert!(params.search_term().is_none());
        assert!(params.cursor().is_none());
    }
}
