//! End-to-end tests driving the assembled application in-process.

use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use futures::future::BoxFuture;
use http::{HeaderMap, Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use portfolio_server::notify::NotifyError;
use portfolio_server::{AppState, Application, Notification, Notifier, ServerConfig};
use portfolio_store::{KvStore, StoreConfig};

const ADMIN_KEY: &str = "admin-secret";

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Debug, Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(
        &'a self,
        notification: &'a Notification,
    ) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        })
    }
}

#[derive(Debug)]
struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify<'a>(
        &'a self,
        _notification: &'a Notification,
    ) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async {
            Err(NotifyError::Status {
                status: 500,
                body: "chat api down".to_string(),
            })
        })
    }
}

/// A content directory with the documents the site serves.
fn content_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("index.html"),
        "<html><body><h1>Portfolio</h1></body></html>",
    )
    .unwrap();
    std::fs::write(dir.path().join("data.json"), r#"{"name":"Ada"}"#).unwrap();
    std::fs::create_dir(dir.path().join("api")).unwrap();
    std::fs::write(
        dir.path().join("api/profile.json"),
        r#"{"available":true}"#,
    )
    .unwrap();
    std::fs::write(dir.path().join("site.css"), "body { color: red; }").unwrap();
    std::fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
    dir
}

struct TestApp {
    router: axum::Router,
    store: Arc<KvStore>,
    content: TempDir,
}

struct Setup {
    config: ServerConfig,
    store: Arc<KvStore>,
    notifier: Option<Arc<dyn Notifier>>,
    content: TempDir,
}

impl Setup {
    fn new() -> Self {
        let content = content_dir();
        let config = ServerConfig {
            content_dir: content.path().to_path_buf(),
            admin_api_key: Some(ADMIN_KEY.to_string()),
            ..ServerConfig::default()
        };
        Self {
            config,
            store: Arc::new(KvStore::memory(true)),
            notifier: None,
            content,
        }
    }

    fn config(mut self, edit: impl FnOnce(&mut ServerConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    fn store(mut self, store: KvStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    fn build(self) -> TestApp {
        let state = AppState::new(self.store.clone(), self.config).with_notifier(self.notifier);
        TestApp {
            router: Application::new(state).into_router(),
            store: self.store,
            content: self.content,
        }
    }
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).unwrap()
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn admin_get(&self, uri: &str) -> TestResponse {
        self.send(
            Request::get(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_KEY))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

fn contact_form() -> Value {
    json!({
        "fullname": "Grace Hopper",
        "email": "grace@example.com",
        "message": "Let's build a compiler."
    })
}

fn sample_email() -> Value {
    json!({
        "from": "sender@example.com",
        "to": "me@example.com",
        "subject": "Project inquiry",
        "body": "Hello there",
        "messageId": "<abc@example.com>"
    })
}

// ============================================================================
// Contact form
// ============================================================================

#[tokio::test]
async fn test_contact_is_stored_and_listed_for_admin() {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = Setup::new().notifier(notifier.clone()).build();

    let response = app.post_json("/api/contact", contact_form()).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let body = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Message sent successfully!");
    assert_eq!(body["notified"], true);
    let id = body["id"].as_str().unwrap().to_string();

    let listing = app.admin_get("/api/admin/contacts").await;
    assert_eq!(listing.status, StatusCode::OK);
    let listing = listing.json();
    assert_eq!(listing["contacts"][0]["id"], id.as_str());
    assert_eq!(listing["contacts"][0]["fullname"], "Grace Hopper");

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(matches!(&sent[0], Notification::Contact { fullname, .. } if fullname == "Grace Hopper"));
}

#[tokio::test]
async fn test_contact_with_blank_field_is_rejected_without_storing() {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = Setup::new().notifier(notifier.clone()).build();

    let mut form = contact_form();
    form["fullname"] = json!("   ");
    let response = app.post_json("/api/contact", form).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(response.json()["error"]["code"], "BAD_REQUEST");
    assert_eq!(app.store.get_stats().unwrap().contact_count, 0);
    assert!(notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_contact_with_empty_field_is_rejected() {
    let app = Setup::new().build();

    for field in ["fullname", "email", "message"] {
        let mut form = contact_form();
        form[field] = json!("");
        let response = app.post_json("/api/contact", form).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{}", field);
        assert_eq!(
            response.json()["error"]["message"],
            "bad request: All fields are required: fullname, email, message"
        );
    }
    assert_eq!(app.store.get_stats().unwrap().contact_count, 0);
}

#[tokio::test]
async fn test_contact_with_malformed_json_is_bad_request() {
    let app = Setup::new().build();
    let response = app
        .send(
            Request::post("/api/contact")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_notification_does_not_fail_contact() {
    let app = Setup::new().notifier(Arc::new(FailingNotifier)).build();

    let response = app.post_json("/api/contact", contact_form()).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["notified"], false);
    assert_eq!(app.store.get_stats().unwrap().contact_count, 1);
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn test_admin_requires_bearer_key() {
    let app = Setup::new().build();

    let missing = app.get("/api/admin/stats").await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let wrong = app
        .send(
            Request::get("/api/admin/stats")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let ok = app.admin_get("/api/admin/stats").await;
    assert_eq!(ok.status, StatusCode::OK);
    let body = ok.json();
    assert_eq!(body["emailCount"], 0);
    assert_eq!(body["contactCount"], 0);
    assert!(body["lastUpdated"].is_string());
}

#[tokio::test]
async fn test_admin_closed_when_no_key_configured() {
    let app = Setup::new().config(|c| c.admin_api_key = None).build();
    let response = app.admin_get("/api/admin/emails").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_lookup_by_id() {
    let app = Setup::new().build();
    let stored = app.post_json("/webhooks/email", sample_email()).await.json();
    let id = stored["emailId"].as_str().unwrap();

    let found = app.admin_get(&format!("/api/admin/emails/{}", id)).await;
    assert_eq!(found.status, StatusCode::OK);
    let found = found.json();
    assert_eq!(found["email"]["subject"], "Project inquiry");
    assert_eq!(found["email"]["source"], "cloudflare-worker");
    assert_eq!(found["email"]["metadata"]["messageId"], "<abc@example.com>");

    let missing = app.admin_get("/api/admin/emails/does-not-exist").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    let missing = app.admin_get("/api/admin/contacts/does-not-exist").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_listing_pages_and_search() {
    let app = Setup::new().build();
    for name in ["Alan", "Barbara", "Claude"] {
        let mut form = contact_form();
        form["fullname"] = json!(name);
        assert_eq!(app.post_json("/api/contact", form).await.status, StatusCode::OK);
    }

    let first = app.admin_get("/api/admin/contacts?limit=2").await.json();
    assert_eq!(first["contacts"][0]["fullname"], "Claude");
    assert_eq!(first["contacts"][1]["fullname"], "Barbara");
    let cursor = first["cursor"].as_str().unwrap();

    let second = app
        .admin_get(&format!("/api/admin/contacts?limit=2&cursor={}", cursor))
        .await
        .json();
    assert_eq!(second["contacts"].as_array().unwrap().len(), 1);
    assert_eq!(second["contacts"][0]["fullname"], "Alan");
    assert!(second["cursor"].is_null());

    let search = app.admin_get("/api/admin/contacts?search=barb").await.json();
    assert_eq!(search["contacts"].as_array().unwrap().len(), 1);
    assert!(search["cursor"].is_null());

    let bad = app.admin_get("/api/admin/contacts?cursor=zz").await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_export_is_an_attachment() {
    let app = Setup::new().build();
    app.post_json("/api/contact", contact_form()).await;
    app.post_json("/webhooks/email", sample_email()).await;

    let response = app.admin_get("/api/admin/export").await;
    assert_eq!(response.status, StatusCode::OK);
    let disposition = response.headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"portfolio-data-"));
    assert!(disposition.ends_with(".json\""));

    let body = response.json();
    assert_eq!(body["version"], "1.0");
    assert_eq!(body["data"]["emails"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["contacts"].as_array().unwrap().len(), 1);
    assert_eq!(body["statistics"]["emailCount"], 1);
}

// ============================================================================
// Webhooks
// ============================================================================

#[tokio::test]
async fn test_webhook_token_is_enforced_when_configured() {
    let notifier = Arc::new(RecordingNotifier::default());
    let app = Setup::new()
        .config(|c| c.webhook_auth_token = Some("hook-token".to_string()))
        .notifier(notifier.clone())
        .build();

    let denied = app.post_json("/webhooks/email", sample_email()).await;
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.get_stats().unwrap().email_count, 0);

    let accepted = app
        .send(
            Request::post("/webhooks/email")
                .header(header::AUTHORIZATION, "Bearer hook-token")
                .body(Body::from(sample_email().to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(accepted.status, StatusCode::OK);
    let body = accepted.json();
    assert_eq!(body["notified"], true);
    assert!(body["emailId"].is_string());
    assert_eq!(app.store.get_stats().unwrap().email_count, 1);
    assert!(matches!(
        &notifier.sent.lock().unwrap()[0],
        Notification::Email { subject, .. } if subject == "Project inquiry"
    ));
}

#[tokio::test]
async fn test_webhook_requires_from_to_subject() {
    let app = Setup::new().build();
    let mut email = sample_email();
    email["subject"] = json!("");
    let response = app.post_json("/webhooks/email", email).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.get_stats().unwrap().email_count, 0);
}

#[tokio::test]
async fn test_webhook_without_notifier_reports_not_notified() {
    let app = Setup::new().build();
    let response = app.post_json("/webhooks/email", sample_email()).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["notified"], false);
}

#[tokio::test]
async fn test_webhook_ping_and_status() {
    let app = Setup::new().build();

    let ping = app
        .send(
            Request::get("/webhooks/ping")
                .header(header::USER_AGENT, "relay/1.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .json();
    assert_eq!(ping["method"], "GET");
    assert_eq!(ping["userAgent"], "relay/1.0");

    let status = app.get("/webhooks/status").await.json();
    assert_eq!(status["status"], "healthy");
    assert_eq!(status["storage"], "memory");
    assert_eq!(status["statistics"]["emailCount"], 0);
}

// ============================================================================
// KV browser
// ============================================================================

fn durable_store(dir: &TempDir, local: bool) -> KvStore {
    KvStore::open(&StoreConfig {
        path: dir.path().join("kv"),
        allow_fallback: false,
        local,
    })
    .unwrap()
}

#[tokio::test]
async fn test_kv_browser_forbidden_in_production() {
    let kv_dir = tempfile::tempdir().unwrap();
    let app = Setup::new()
        .config(|c| c.deployment_id = Some("deploy-42".to_string()))
        .store(durable_store(&kv_dir, false))
        .build();

    for uri in ["/dev/kv", "/dev/kv/browse", "/dev/kv/entry", "/dev/kv/stats"] {
        let response = app.get(uri).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(response.json()["error"]["code"], "LOCAL_ONLY");
    }
}

#[tokio::test]
async fn test_kv_browser_unavailable_on_memory_fallback() {
    let app = Setup::new().build();

    let browse = app.get("/dev/kv/browse").await;
    assert_eq!(browse.status, StatusCode::SERVICE_UNAVAILABLE);

    let viewer = app.get("/dev/kv").await;
    assert_eq!(viewer.status, StatusCode::OK);
    assert!(viewer.text().contains("/dev/kv/browse"));
}

#[tokio::test]
async fn test_kv_browser_entry_lifecycle() {
    let kv_dir = tempfile::tempdir().unwrap();
    let app = Setup::new().store(durable_store(&kv_dir, true)).build();

    let missing_key = app.get("/dev/kv/entry").await;
    assert_eq!(missing_key.status, StatusCode::BAD_REQUEST);

    let written = app
        .post_json(
            "/dev/kv/entry",
            json!({ "key": ["scratch", "note"], "value": { "n": 1 } }),
        )
        .await;
    assert_eq!(written.status, StatusCode::OK);
    assert_eq!(written.json()["ok"], true);

    let read = app.get("/dev/kv/entry?key=scratch/note").await.json();
    assert_eq!(read["key"], json!(["scratch", "note"]));
    assert_eq!(read["value"]["n"], 1);

    let browse = app.get("/dev/kv/browse?prefix=scratch").await.json();
    assert_eq!(browse["count"], 1);
    assert_eq!(browse["hasMore"], false);
    assert_eq!(browse["prefix"], "scratch");

    let root = app.get("/dev/kv/browse").await.json();
    assert_eq!(root["prefix"], "root");

    let deleted = app
        .send(
            Request::delete("/dev/kv/entry?key=scratch/note")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .json();
    assert_eq!(deleted["deleted"], true);
    assert_eq!(deleted["existed"], true);

    let gone = app.get("/dev/kv/entry?key=scratch/note").await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

/// Percent-encode a query value the way `encodeURIComponent` does.
fn encode_component(text: &str) -> String {
    text.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

#[tokio::test]
async fn test_kv_browser_edits_and_deletes_stored_email_by_json_key() {
    let kv_dir = tempfile::tempdir().unwrap();
    let app = Setup::new().store(durable_store(&kv_dir, true)).build();
    app.post_json("/webhooks/email", sample_email()).await;

    let listed = app.get("/dev/kv/browse?prefix=emails").await.json();
    let entries = listed["entries"].as_array().unwrap();
    let time_entry = entries
        .iter()
        .find(|e| e["key"][0] == "emails")
        .unwrap();
    assert!(time_entry["key"][1].is_i64());
    let key_text = time_entry["key"].to_string();

    // Saving an edit through the text field rewrites the same entry.
    let mut edited = time_entry["value"].clone();
    edited["subject"] = json!("Edited subject");
    let saved = app
        .post_json(
            "/dev/kv/entry",
            json!({ "key": key_text, "value": edited }),
        )
        .await;
    assert_eq!(saved.status, StatusCode::OK);
    let page = app.admin_get("/api/admin/emails").await.json();
    assert_eq!(page["emails"].as_array().unwrap().len(), 1);
    assert_eq!(page["emails"][0]["subject"], "Edited subject");

    let deleted = app
        .send(
            Request::delete(format!("/dev/kv/entry?key={}", encode_component(&key_text)))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.json()["existed"], true);
    assert_eq!(app.store.get_stats().unwrap().email_count, 0);
}

#[tokio::test]
async fn test_kv_stats_include_application_counts() {
    let kv_dir = tempfile::tempdir().unwrap();
    let app = Setup::new().store(durable_store(&kv_dir, true)).build();
    app.post_json("/api/contact", contact_form()).await;

    let stats = app.get("/dev/kv/stats").await.json();
    assert_eq!(stats["totalEntries"], 2);
    assert_eq!(stats["applicationStats"]["contactCount"], 1);
    assert_eq!(stats["environment"], "local");
    assert_eq!(stats["kvType"], "sled");
}

// ============================================================================
// Pages, static files, CORS, hot reload
// ============================================================================

#[tokio::test]
async fn test_content_documents() {
    let app = Setup::new().build();

    let data = app.get("/api/data").await;
    assert_eq!(data.status, StatusCode::OK);
    assert_eq!(data.headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(data.text(), r#"{"name":"Ada"}"#);

    for uri in ["/api/profile", "/api/hiring", "/api/ai-profile"] {
        let profile = app.get(uri).await;
        assert_eq!(profile.status, StatusCode::OK);
        assert_eq!(profile.headers[header::CACHE_CONTROL], "public, max-age=3600");
        assert_eq!(profile.headers["x-robots-tag"], "index, follow");
        assert_eq!(profile.headers["x-hiring-status"], "available");
    }
}

#[tokio::test]
async fn test_index_page_and_dev_injection() {
    let app = Setup::new().build();
    let page = app.get("/").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.text().contains("<h1>Portfolio</h1>"));
    assert!(!page.text().contains("WebSocket"));

    let dev = Setup::new().config(|c| c.dev_mode = true).build();
    let page = dev.get("/index.html").await.text();
    let script = page.find("WebSocket").unwrap();
    assert!(script < page.find("</body>").unwrap());
}

#[tokio::test]
async fn test_missing_index_is_not_found() {
    let app = Setup::new().build();
    std::fs::remove_file(app.content.path().join("index.html")).unwrap();

    let response = app.get("/").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_static_files_and_dotfiles() {
    let app = Setup::new().build();

    let css = app.get("/site.css").await;
    assert_eq!(css.status, StatusCode::OK);
    assert_eq!(css.text(), "body { color: red; }");
    assert_eq!(css.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let dotfile = app.get("/.env").await;
    assert_eq!(dotfile.status, StatusCode::NOT_FOUND);
    assert_eq!(dotfile.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let unknown = app.get("/missing.txt").await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_preflight_is_answered() {
    let app = Setup::new().build();
    let response = app
        .send(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/contact")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(response.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        response.headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, DELETE, OPTIONS"
    );
    assert_eq!(
        response.headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization"
    );
}

#[tokio::test]
async fn test_request_id_is_returned() {
    let app = Setup::new().build();

    let generated = app.get("/webhooks/ping").await;
    assert!(generated.headers.contains_key("x-request-id"));

    let echoed = app
        .send(
            Request::get("/webhooks/ping")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(echoed.headers["x-request-id"], "req-123");
}

#[tokio::test]
async fn test_reload_socket_only_in_dev_mode() {
    let app = Setup::new().build();
    assert_eq!(app.get("/ws").await.status, StatusCode::NOT_FOUND);

    let dev = Setup::new().config(|c| c.dev_mode = true).build();
    assert_eq!(dev.get("/ws").await.status, StatusCode::NOT_IMPLEMENTED);
}
