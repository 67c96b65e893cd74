//! Core data types for the portfolio backend.
//!
//! All record types serialize with camelCase field names, which is the
//! shape both the admin API and the persisted JSON values use.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Free-form metadata attached to an email (original headers, attachment
/// descriptors, upstream message id).
pub type Metadata = Map<String, Value>;

/// Generate a fresh record identifier.
///
/// Identifiers are opaque strings; today they are hyphenated UUID v4.
#[must_use]
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Convert a millisecond timestamp into a `DateTime<Utc>`.
///
/// Returns `None` for values outside chrono's representable range.
#[must_use]
pub fn timestamp_to_datetime(ts: Timestamp) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ts).single()
}

// ============================================================================
// Source Tags
// ============================================================================

/// Where an email entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmailSource {
    /// Relayed by the upstream mail worker through the webhook.
    CloudflareWorker,
    /// Written directly, e.g. by operational tooling.
    Direct,
}

impl EmailSource {
    /// Wire name of the source tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CloudflareWorker => "cloudflare-worker",
            Self::Direct => "direct",
        }
    }
}

/// Source tag for contact messages. There is only one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContactSource {
    #[default]
    #[serde(rename = "contact-form")]
    ContactForm,
}

// ============================================================================
// Email Records
// ============================================================================

/// A stored email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    pub timestamp: Timestamp,
    pub source: EmailSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl EmailMessage {
    /// Case-insensitive substring match against subject, sender and body.
    ///
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        self.subject.to_lowercase().contains(needle)
            || self.from.to_lowercase().contains(needle)
            || self.body.to_lowercase().contains(needle)
    }
}

/// An email as accepted from a caller, before the store assigns an id and
/// a timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub html: Option<String>,
    pub source: EmailSource,
    pub metadata: Option<Metadata>,
}

impl NewEmail {
    /// Attach the store-assigned identity.
    pub fn into_message(self, id: String, timestamp: Timestamp) -> EmailMessage {
        EmailMessage {
            id,
            from: self.from,
            to: self.to,
            subject: self.subject,
            body: self.body,
            html: self.html,
            timestamp,
            source: self.source,
            metadata: self.metadata,
        }
    }
}

// ============================================================================
// Contact Records
// ============================================================================

/// A stored contact-form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: String,
    pub fullname: String,
    pub email: String,
    pub message: String,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub source: ContactSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ContactMessage {
    /// Case-insensitive substring match against name, email and message.
    ///
    /// `needle` must already be lowercased.
    pub fn matches(&self, needle: &str) -> bool {
        self.fullname.to_lowercase().contains(needle)
            || self.email.to_lowercase().contains(needle)
            || self.message.to_lowercase().contains(needle)
    }
}

/// A contact submission before the store assigns an id and a timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContact {
    pub fullname: String,
    pub email: String,
    pub message: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewContact {
    /// Attach the store-assigned identity.
    pub fn into_message(self, id: String, timestamp: Timestamp) -> ContactMessage {
        ContactMessage {
            id,
            fullname: self.fullname,
            email: self.email,
            message: self.message,
            timestamp,
            source: ContactSource::ContactForm,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
        }
    }
}

// ============================================================================
// Pagination and Statistics
// ============================================================================

/// One page of records, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque cursor for the next (older) page; `None` when exhausted.
    pub cursor: Option<String>,
}

/// Record counts per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStats {
    pub email_count: u64,
    pub contact_count: u64,
}

// ============================================================================
// Tests
// ============================================================================
