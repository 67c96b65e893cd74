//! Error types for the storage layer.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The durable backend reported a failure.
    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),

    /// The durable store could not be opened and no fallback is allowed.
    #[error("durable store unavailable: {0}")]
    Unavailable(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A key could not be parsed or decoded.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A pagination cursor was malformed or belongs to another prefix.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// The requested record or key does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The two index entries of a record disagree.
    #[error("corrupt index entry: {0}")]
    CorruptIndex(String),

    /// Generic key access was attempted outside a local context.
    #[error("generic key access is only available in local development")]
    LocalOnly,

    /// Generic key access was attempted against the in-memory fallback.
    #[error("generic key access is not supported by the in-memory fallback store")]
    FallbackUnsupported,
}
