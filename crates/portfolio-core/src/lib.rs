//! portfolio-core: record types for the portfolio backend
//!
//! This crate defines the two persisted record kinds and the small value
//! types that travel between the store and the HTTP layer:
//!
//! - [`EmailMessage`]: mail relayed by the upstream mail worker
//! - [`ContactMessage`]: submissions from the site's contact form
//! - [`Page`]: one reverse-chronological page of records plus a cursor
//! - [`AppStats`]: per-collection record counts
//!
//! Records are immutable once written. Identifiers and timestamps are
//! assigned by the store, so the `New*` input types carry neither.

pub mod types;

pub use types::*;
