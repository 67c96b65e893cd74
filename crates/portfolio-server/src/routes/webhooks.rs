//! Email webhook for the upstream mail relay.
//!
//! Endpoints:
//! - `POST /webhooks/email`: store a relayed email
//! - `GET /webhooks/ping`: liveness echo
//! - `GET /webhooks/status`: store health and counts

use axum::extract::Request;
use axum::response::Response;
use chrono::Utc;
use http::header;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use portfolio_core::{AppStats, EmailSource, Metadata, NewEmail};

use crate::error::{ApiError, ApiResult};
use crate::notify::Notification;
use crate::router::RouteGroup;
use crate::routes::{bearer_token, header_text, notify_owner, read_json, success};
use crate::state::AppState;

/// Build the webhook routes.
pub fn routes(state: &AppState) -> RouteGroup {
    RouteGroup::new("/webhooks")
        .post("/email", state.bind(receive_email))
        .get("/ping", state.bind(ping))
        .get("/status", state.bind(status))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Payload posted by the mail relay.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailWebhook {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub headers: Option<Value>,
    #[serde(default)]
    pub attachments: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub message_id: Option<String>,
}

impl EmailWebhook {
    /// Upstream details kept alongside the email. Absent fields are omitted.
    fn metadata(&self) -> Option<Metadata> {
        let mut metadata = Map::new();
        let fields = [
            ("headers", self.headers.clone()),
            ("attachments", self.attachments.clone()),
            ("messageId", self.message_id.clone().map(Value::String)),
            ("originalTimestamp", self.timestamp.clone()),
        ];
        for (name, value) in fields {
            if let Some(value) = value.filter(|v| !v.is_null()) {
                metadata.insert(name.to_string(), value);
            }
        }
        (!metadata.is_empty()).then_some(metadata)
    }
}

/// Response for a stored email.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailStored {
    pub email_id: String,
    pub notified: bool,
}

/// Response for the status endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookStatus {
    pub status: &'static str,
    pub statistics: AppStats,
    /// `durable` or `memory`.
    pub storage: &'static str,
    pub last_checked: String,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /webhooks/email - Store an email relayed by the mail worker.
///
/// When `WEBHOOK_AUTH_TOKEN` is configured the request must carry it as a
/// bearer token. `from`, `to` and `subject` are required.
async fn receive_email(state: AppState, req: Request) -> ApiResult<Response> {
    if let Some(expected) = state.config().webhook_auth_token.as_deref() {
        if bearer_token(req.headers()) != Some(expected) {
            tracing::warn!("Unauthorized webhook attempt");
            return Err(ApiError::Unauthorized("invalid webhook token".to_string()));
        }
    }

    let payload: EmailWebhook = read_json(req).await?;
    if payload.from.trim().is_empty()
        || payload.to.trim().is_empty()
        || payload.subject.trim().is_empty()
    {
        return Err(ApiError::BadRequest(
            "Missing required fields: from, to, subject".to_string(),
        ));
    }

    tracing::info!(
        from = %payload.from,
        to = %payload.to,
        subject = %payload.subject,
        "Received email webhook"
    );

    let metadata = payload.metadata();
    let email = NewEmail {
        from: payload.from,
        to: payload.to,
        subject: payload.subject,
        body: payload.body.unwrap_or_default(),
        html: payload.html,
        source: EmailSource::CloudflareWorker,
        metadata,
    };
    let received = Utc::now();
    let email_id = state.store().store_email(email.clone()).await?;

    let notified = notify_owner(&state, Notification::email(&email_id, &email, received)).await;
    success(
        "Email processed and stored successfully",
        EmailStored { email_id, notified },
    )
}

/// GET /webhooks/ping - Echo that the webhook endpoint is reachable.
async fn ping(_state: AppState, req: Request) -> ApiResult<Response> {
    success(
        "Webhook endpoint is working",
        json!({
            "timestamp": Utc::now().to_rfc3339(),
            "method": req.method().as_str(),
            "userAgent": header_text(req.headers(), header::USER_AGENT),
        }),
    )
}

/// GET /webhooks/status - Store health and record counts.
async fn status(state: AppState, _req: Request) -> ApiResult<Response> {
    let statistics = state.store().get_stats()?;
    success(
        "Success",
        WebhookStatus {
            status: "healthy",
            statistics,
            storage: state.store().backend_kind().as_str(),
            last_checked: Utc::now().to_rfc3339(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_omits_absent_fields() {
        let payload: EmailWebhook = serde_json::from_value(json!({
            "from": "a@example.com",
            "to": "b@example.com",
            "subject": "Hi",
            "messageId": "<m1@example.com>",
            "timestamp": 1700000000000_i64,
            "headers": null
        }))
        .unwrap();

        let metadata = payload.metadata().unwrap();
        assert_eq!(metadata["messageId"], "<m1@example.com>");
        assert_eq!(metadata["originalTimestamp"], 1700000000000_i64);
        assert!(!metadata.contains_key("headers"));
        assert!(!metadata.contains_key("attachments"));
    }

    #[test]
    fn test_metadata_none_when_empty() {
        let payload: EmailWebhook = serde_json::from_value(json!({
            "from": "a@example.com",
            "to": "b@example.com",
            "subject": "Hi"
        }))
        .unwrap();
        assert!(payload.metadata().is_none());
    }
}
