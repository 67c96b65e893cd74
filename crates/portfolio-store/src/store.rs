//! Typed store operations for emails and contact messages.
//!
//! The `KvStore` type owns a [`KvBackend`] and exposes record-level
//! operations plus gated generic key access for local tooling.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;

use portfolio_core::{
    AppStats, ContactMessage, EmailMessage, NewContact, NewEmail, Page, Timestamp, new_record_id,
};

use crate::backend::{BackendKind, Direction, KvBackend};
use crate::durable::SledBackend;
use crate::error::{StoreError, StoreResult};
use crate::key::KvKey;
use crate::memory::MemoryBackend;

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Upper bound on any page size.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Default number of search results.
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Number of most recent records a search looks at.
pub const SEARCH_WINDOW: usize = 200;

/// Number of entries `RawAccess::stats` inspects.
const RAW_STATS_WINDOW: usize = 1000;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for opening the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// On-disk location of the sled database.
    pub path: PathBuf,
    /// Fall back to the in-memory backend if the durable one cannot open.
    /// Only ever enabled in development mode.
    pub allow_fallback: bool,
    /// Whether the process runs in a local (non-production) context.
    /// Generic key access is refused otherwise.
    pub local: bool,
}

impl StoreConfig {
    /// Production defaults: no fallback, no generic access.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            allow_fallback: false,
            local: false,
        }
    }
}

// ============================================================================
// Record Kinds
// ============================================================================

/// A persisted record kind with its two index collections.
pub trait Record: Serialize + DeserializeOwned {
    /// Collection holding the time-ordered index.
    const COLLECTION: &'static str;
    /// Collection holding the by-id index.
    const BY_ID: &'static str;

    fn id(&self) -> &str;
    fn timestamp(&self) -> Timestamp;
    /// `needle` is lowercased by the caller.
    fn matches(&self, needle: &str) -> bool;
}

impl Record for EmailMessage {
    const COLLECTION: &'static str = "emails";
    const BY_ID: &'static str = "emails_by_id";

    fn id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn matches(&self, needle: &str) -> bool {
        EmailMessage::matches(self, needle)
    }
}

impl Record for ContactMessage {
    const COLLECTION: &'static str = "contacts";
    const BY_ID: &'static str = "contacts_by_id";

    fn id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn matches(&self, needle: &str) -> bool {
        ContactMessage::matches(self, needle)
    }
}

fn time_key<R: Record>(timestamp: Timestamp, id: &str) -> KvKey {
    KvKey::root().with(R::COLLECTION).with(timestamp).with(id)
}

fn id_key<R: Record>(id: &str) -> KvKey {
    KvKey::root().with(R::BY_ID).with(id)
}

fn collection_prefix<R: Record>() -> Vec<u8> {
    KvKey::root().with(R::COLLECTION).encode()
}

fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_PAGE_SIZE)
}

fn decode_cursor(cursor: &str, prefix: &[u8]) -> StoreResult<Vec<u8>> {
    let bytes = hex::decode(cursor)
        .map_err(|e| StoreError::InvalidCursor(format!("not a valid cursor: {}", e)))?;
    if !bytes.starts_with(prefix) {
        return Err(StoreError::InvalidCursor(
            "cursor does not belong to this listing".to_string(),
        ));
    }
    Ok(bytes)
}

// ============================================================================
// Store
// ============================================================================

/// Key-value store for the portfolio's two record kinds.
#[derive(Debug)]
pub struct KvStore {
    backend: Arc<dyn KvBackend>,
    local: bool,
    /// Last timestamp handed out.
    last_timestamp: AtomicI64,
}

impl KvStore {
    /// Open the durable store, falling back to memory when allowed.
    ///
    /// Without `allow_fallback`, a durable store that cannot be opened is
    /// fatal and reported as [`StoreError::Unavailable`].
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        match SledBackend::open(&config.path) {
            Ok(backend) => {
                tracing::info!("Key-value store initialized");
                Ok(Self::with_backend(Arc::new(backend), config.local))
            }
            Err(e) if config.allow_fallback => {
                tracing::warn!(
                    error = %e,
                    "Durable store unavailable, using in-memory store for development"
                );
                Ok(Self::memory(config.local))
            }
            Err(e) => {
                tracing::error!(error = %e, "Durable store is required in production");
                Err(StoreError::Unavailable(e.to_string()))
            }
        }
    }

    /// Build a store over an explicit backend.
    pub fn with_backend(backend: Arc<dyn KvBackend>, local: bool) -> Self {
        Self {
            backend,
            local,
            last_timestamp: AtomicI64::new(0),
        }
    }

    /// Build a non-durable store.
    pub fn memory(local: bool) -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()), local)
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Refuse with [`StoreError::LocalOnly`] outside a local context.
    pub fn ensure_local(&self) -> StoreResult<()> {
        if self.local {
            Ok(())
        } else {
            Err(StoreError::LocalOnly)
        }
    }

    /// Strictly increasing per store, so insertion order is listing order
    /// even within one millisecond.
    fn next_timestamp(&self) -> Timestamp {
        let now = Utc::now().timestamp_millis();
        let step = |last: Timestamp| Some(now.max(last.saturating_add(1)));
        match self
            .last_timestamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, step)
        {
            Ok(previous) | Err(previous) => now.max(previous.saturating_add(1)),
        }
    }

    // ==================== Email Operations ====================

    /// Persist an email; the store assigns its id and timestamp.
    /// Returns once the write is durable.
    pub async fn store_email(&self, email: NewEmail) -> StoreResult<String> {
        let message = email.into_message(new_record_id(), self.next_timestamp());
        self.insert_record(&message).await?;
        tracing::info!(email_id = %message.id, "Stored email");
        Ok(message.id)
    }

    pub fn get_email(&self, id: &str) -> StoreResult<Option<EmailMessage>> {
        self.get_record(id)
    }

    /// Newest-first page of emails.
    pub fn list_emails(
        &self,
        limit: usize,
        cursor: Option<&str>,
    ) -> StoreResult<Page<EmailMessage>> {
        self.list_records(limit, cursor)
    }

    /// Best-effort search over the most recent emails.
    pub fn search_emails(&self, query: &str, limit: usize) -> StoreResult<Vec<EmailMessage>> {
        self.search_records(query, limit)
    }

    /// Every stored email, newest first.
    pub fn all_emails(&self) -> StoreResult<Vec<EmailMessage>> {
        self.collect_all()
    }

    // ==================== Contact Operations ====================

    /// Persist a contact message; the store assigns its id and timestamp.
    pub async fn store_contact(&self, contact: NewContact) -> StoreResult<String> {
        let message = contact.into_message(new_record_id(), self.next_timestamp());
        self.insert_record(&message).await?;
        tracing::info!(contact_id = %message.id, "Stored contact message");
        Ok(message.id)
    }

    pub fn get_contact(&self, id: &str) -> StoreResult<Option<ContactMessage>> {
        self.get_record(id)
    }

    /// Newest-first page of contact messages.
    pub fn list_contacts(
        &self,
        limit: usize,
        cursor: Option<&str>,
    ) -> StoreResult<Page<ContactMessage>> {
        self.list_records(limit, cursor)
    }

    /// Best-effort search over the most recent contact messages.
    pub fn search_contacts(&self, query: &str, limit: usize) -> StoreResult<Vec<ContactMessage>> {
        self.search_records(query, limit)
    }

    /// Every stored contact message, newest first.
    pub fn all_contacts(&self) -> StoreResult<Vec<ContactMessage>> {
        self.collect_all()
    }

    // ==================== Statistics ====================

    /// Count both collections with a full prefix scan.
    pub fn get_stats(&self) -> StoreResult<AppStats> {
        Ok(AppStats {
            email_count: self
                .backend
                .count_prefix(&collection_prefix::<EmailMessage>())?,
            contact_count: self
                .backend
                .count_prefix(&collection_prefix::<ContactMessage>())?,
        })
    }

    // ==================== Generic Access ====================

    /// Generic key access for the KV browser.
    ///
    /// Refused outside a local context first, then refused when running
    /// on the in-memory fallback.
    pub fn raw(&self) -> StoreResult<RawAccess<'_>> {
        self.ensure_local()?;
        if self.backend.kind() != BackendKind::Durable {
            return Err(StoreError::FallbackUnsupported);
        }
        Ok(RawAccess {
            backend: self.backend.as_ref(),
        })
    }

    // ==================== Record Internals ====================

    async fn insert_record<R: Record>(&self, record: &R) -> StoreResult<()> {
        let value = serde_json::to_vec(record)?;
        self.backend.insert_batch(vec![
            (time_key::<R>(record.timestamp(), record.id()).encode(), value.clone()),
            (id_key::<R>(record.id()).encode(), value),
        ])?;
        self.backend.flush().await
    }

    fn get_record<R: Record>(&self, id: &str) -> StoreResult<Option<R>> {
        let Some(bytes) = self.backend.get(&id_key::<R>(id).encode())? else {
            return Ok(None);
        };
        let record: R = serde_json::from_slice(&bytes)?;
        if record.id() != id {
            return Err(StoreError::CorruptIndex(format!(
                "{} entry for {} holds record {}",
                R::BY_ID,
                id,
                record.id()
            )));
        }
        let time_entry = time_key::<R>(record.timestamp(), id).encode();
        if self.backend.get(&time_entry)?.is_none() {
            tracing::error!(
                collection = R::COLLECTION,
                record_id = %id,
                timestamp = record.timestamp(),
                "Record is missing its time-ordered index entry"
            );
            return Err(StoreError::CorruptIndex(format!(
                "{} has no entry for {} at {}",
                R::COLLECTION,
                id,
                record.timestamp()
            )));
        }
        Ok(Some(record))
    }

    fn list_records<R: Record>(&self, limit: usize, cursor: Option<&str>) -> StoreResult<Page<R>> {
        let prefix = collection_prefix::<R>();
        let after = cursor.map(|c| decode_cursor(c, &prefix)).transpose()?;
        let limit = clamp_limit(limit);

        let mut rows = self
            .backend
            .scan(&prefix, after.as_deref(), Direction::Reverse, limit + 1)?;
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let cursor = if has_more {
            rows.last().map(|(key, _)| hex::encode(key))
        } else {
            None
        };
        let items = rows
            .iter()
            .map(|(_, value)| serde_json::from_slice(value))
            .collect::<Result<Vec<R>, _>>()?;

        Ok(Page { items, cursor })
    }

    fn search_records<R: Record>(&self, query: &str, limit: usize) -> StoreResult<Vec<R>> {
        let needle = query.to_lowercase();
        let limit = clamp_limit(limit);
        let rows = self.backend.scan(
            &collection_prefix::<R>(),
            None,
            Direction::Reverse,
            SEARCH_WINDOW,
        )?;

        let mut found = Vec::new();
        for (_, value) in rows {
            let record: R = serde_json::from_slice(&value)?;
            if record.matches(&needle) {
                found.push(record);
                if found.len() >= limit {
                    break;
                }
            }
        }
        Ok(found)
    }

    fn collect_all<R: Record>(&self) -> StoreResult<Vec<R>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.list_records::<R>(MAX_PAGE_SIZE, cursor.as_deref())?;
            all.extend(page.items);
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(all),
            }
        }
    }
}

// ============================================================================
// Generic Access
// ============================================================================

/// A decoded key/value entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KvEntry {
    pub key: KvKey,
    pub value: Value,
}

/// Summary of the whole keyspace.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStats {
    /// Entries counted, capped at the inspection window.
    pub total_entries: u64,
    /// Distinct first key parts, sorted.
    pub available_prefixes: Vec<String>,
}

/// Generic key operations, only obtainable through [`KvStore::raw`].
#[derive(Debug, Clone, Copy)]
pub struct RawAccess<'a> {
    backend: &'a dyn KvBackend,
}

impl RawAccess<'_> {
    fn decode_value(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
    }

    /// Forward page of entries under `prefix`.
    pub fn list(
        &self,
        prefix: &KvKey,
        limit: usize,
        cursor: Option<&str>,
    ) -> StoreResult<Page<KvEntry>> {
        let prefix = prefix.encode();
        let after = cursor.map(|c| decode_cursor(c, &prefix)).transpose()?;
        let limit = clamp_limit(limit);

        let mut rows = self
            .backend
            .scan(&prefix, after.as_deref(), Direction::Forward, limit + 1)?;
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let cursor = if has_more {
            rows.last().map(|(key, _)| hex::encode(key))
        } else {
            None
        };
        let items = rows
            .iter()
            .map(|(key, value)| {
                Ok(KvEntry {
                    key: KvKey::decode(key)?,
                    value: Self::decode_value(value),
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Page { items, cursor })
    }

    pub fn get(&self, key: &KvKey) -> StoreResult<Option<KvEntry>> {
        Ok(self.backend.get(&key.encode())?.map(|bytes| KvEntry {
            key: key.clone(),
            value: Self::decode_value(&bytes),
        }))
    }

    pub async fn set(&self, key: &KvKey, value: &Value) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("key must not be empty".to_string()));
        }
        self.backend.insert(&key.encode(), serde_json::to_vec(value)?)?;
        self.backend.flush().await
    }

    /// Returns whether the key existed.
    pub async fn delete(&self, key: &KvKey) -> StoreResult<bool> {
        let existed = self.backend.remove(&key.encode())?;
        self.backend.flush().await?;
        Ok(existed)
    }

    pub fn stats(&self) -> StoreResult<RawStats> {
        let rows = self
            .backend
            .scan(&[], None, Direction::Forward, RAW_STATS_WINDOW)?;
        let mut prefixes = std::collections::BTreeSet::new();
        for (key, _) in &rows {
            if let Some(first) = KvKey::decode(key)?.first() {
                prefixes.insert(first.to_string());
            }
        }
        Ok(RawStats {
            total_entries: rows.len() as u64,
            available_prefixes: prefixes.into_iter().collect(),
        })
    }
}

// ============================================================================
// One-Time Initialization
// ============================================================================

/// Get-or-create holder for the process's store.
///
/// Concurrent callers of [`StoreCell::get_or_open`] share one open attempt.
#[derive(Debug, Default)]
pub struct StoreCell {
    cell: OnceCell<Arc<KvStore>>,
}

impl StoreCell {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    /// Open the store on first use and return the shared handle.
    pub async fn get_or_open(&self, config: &StoreConfig) -> StoreResult<Arc<KvStore>> {
        self.cell
            .get_or_try_init(|| async { KvStore::open(config).map(Arc::new) })
            .await
            .cloned()
    }

    /// The store, if it has been opened.
    pub fn get(&self) -> Option<Arc<KvStore>> {
        self.cell.get().cloned()
    }
}

// ============================================================================
// Tests
// ============================================================================
