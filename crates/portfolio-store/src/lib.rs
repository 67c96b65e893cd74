//! portfolio-store: key-value storage for the portfolio backend
//!
//! This crate provides:
//! - An order-preserving tuple key codec ([`KvKey`])
//! - A durable sled backend and an in-memory fallback behind [`KvBackend`]
//! - Typed operations for emails and contact messages ([`KvStore`])
//! - Gated generic key access for local tooling ([`RawAccess`])
//!
//! # Layout
//!
//! Every record is written twice in one batch:
//!
//! - `["emails", timestamp, id]` / `["contacts", timestamp, id]` for
//!   reverse-chronological scans
//! - `["emails_by_id", id]` / `["contacts_by_id", id]` for direct lookup
//!
//! # Usage
//!
//! ```rust,ignore
//! use portfolio_store::{KvStore, StoreConfig};
//!
//! let store = KvStore::open(&StoreConfig::new("./data/kv"))?;
//! let id = store.store_contact(new_contact).await?;
//! let page = store.list_contacts(50, None)?;
//! ```

pub mod backend;
pub mod durable;
pub mod error;
pub mod key;
pub mod memory;
pub mod store;

pub use backend::{BackendKind, Direction, KvBackend};
pub use durable::SledBackend;
pub use error::{StoreError, StoreResult};
pub use key::{KeyPart, KvKey};
pub use memory::MemoryBackend;
pub use store::{
    DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_LIMIT, KvEntry, KvStore, MAX_PAGE_SIZE, RawAccess,
    RawStats, Record, SEARCH_WINDOW, StoreCell, StoreConfig,
};

// Re-export portfolio-core for downstream crates
pub use portfolio_core;
