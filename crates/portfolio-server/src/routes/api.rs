//! Public API: portfolio content, profile documents, contact form.
//!
//! Endpoints:
//! - `GET /api/data`: the portfolio content document
//! - `GET /api/profile`, `/api/hiring`, `/api/ai-profile`: profile document
//! - `POST /api/contact`: store a contact message and notify the owner

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use http::{HeaderName, header};
use serde::{Deserialize, Serialize};

use portfolio_core::NewContact;

use crate::error::{ApiError, ApiResult};
use crate::notify::Notification;
use crate::router::RouteGroup;
use crate::routes::{client_ip, header_text, notify_owner, read_content, read_json, success};
use crate::state::AppState;

/// Build the public API routes.
pub fn routes(state: &AppState) -> RouteGroup {
    RouteGroup::new("/api")
        .get("/data", state.bind(get_data))
        .get("/profile", state.bind(get_profile))
        .get("/hiring", state.bind(get_profile))
        .get("/ai-profile", state.bind(get_profile))
        .post("/contact", state.bind(submit_contact))
}

// ============================================================================
// Content Documents
// ============================================================================

/// GET /api/data - The portfolio content document, verbatim.
async fn get_data(state: AppState, _req: Request) -> ApiResult<Response> {
    let data = read_content(&state, "data.json").await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], data).into_response())
}

/// GET /api/profile - The profile document with discoverability headers.
async fn get_profile(state: AppState, _req: Request) -> ApiResult<Response> {
    let profile = read_content(&state, "api/profile.json").await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
            (HeaderName::from_static("x-robots-tag"), "index, follow"),
            (HeaderName::from_static("x-hiring-status"), "available"),
        ],
        profile,
    )
        .into_response())
}

// ============================================================================
// Contact Form
// ============================================================================

/// Body of a contact form submission.
#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub fullname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

/// Response for a stored contact message.
#[derive(Debug, Serialize)]
pub struct ContactResponse {
    /// Identifier of the stored message.
    pub id: String,
    /// Whether the owner was notified.
    pub notified: bool,
}

/// POST /api/contact - Store a contact message.
///
/// All three fields are required after trimming. The message is stored
/// before the notification is attempted; a failed notification is
/// reported as `"notified": false` and does not fail the request.
async fn submit_contact(state: AppState, req: Request) -> ApiResult<Response> {
    let ip_address = client_ip(req.headers());
    let user_agent = header_text(req.headers(), header::USER_AGENT);
    let form: ContactRequest = read_json(req).await?;

    let fullname = form.fullname.trim();
    let email = form.email.trim();
    let message = form.message.trim();
    if fullname.is_empty() || email.is_empty() || message.is_empty() {
        return Err(ApiError::BadRequest(
            "All fields are required: fullname, email, message".to_string(),
        ));
    }

    let contact = NewContact {
        fullname: fullname.to_string(),
        email: email.to_string(),
        message: message.to_string(),
        ip_address,
        user_agent,
    };
    let notification = Notification::contact(&contact);
    let id = state.store().store_contact(contact).await?;

    let notified = notify_owner(&state, notification).await;
    success("Message sent successfully!", ContactResponse { id, notified })
}
