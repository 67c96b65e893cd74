//! Backend abstraction over an ordered byte-keyed map.
//!
//! Two implementations exist: [`crate::SledBackend`] (durable, default) and
//! [`crate::MemoryBackend`] (non-durable fallback for development and
//! tests). Keys handed to a backend are already encoded with
//! [`crate::KvKey::encode`].

use std::fmt;
use std::future::Future;
use std::ops::Bound;
use std::pin::Pin;

use crate::error::StoreResult;

/// An encoded key/value pair.
pub type RawPair = (Vec<u8>, Vec<u8>);

/// Future returned by [`KvBackend::flush`].
pub type FlushFuture<'a> = Pin<Box<dyn Future<Output = StoreResult<()>> + Send + 'a>>;

/// What kind of storage sits behind a [`KvBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Persistent on-disk storage.
    Durable,
    /// Process-local memory; lost on restart.
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Durable => "durable",
            Self::Memory => "memory",
        }
    }
}

/// Scan direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// An ordered key-value map with prefix scans and atomic batches.
pub trait KvBackend: Send + Sync + fmt::Debug {
    /// Which kind of storage this is.
    fn kind(&self) -> BackendKind;

    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    fn insert(&self, key: &[u8], value: Vec<u8>) -> StoreResult<()>;

    /// Remove a key. Returns whether it existed.
    fn remove(&self, key: &[u8]) -> StoreResult<bool>;

    /// Insert several pairs so that either all or none become visible.
    fn insert_batch(&self, pairs: Vec<RawPair>) -> StoreResult<()>;

    /// Entries whose key starts with `prefix`, in `direction` order,
    /// strictly past `start_after` when given, at most `limit` of them.
    fn scan(
        &self,
        prefix: &[u8],
        start_after: Option<&[u8]>,
        direction: Direction,
        limit: usize,
    ) -> StoreResult<Vec<RawPair>>;

    /// Number of keys starting with `prefix`.
    fn count_prefix(&self, prefix: &[u8]) -> StoreResult<u64>;

    /// Make every completed write durable without blocking the caller's
    /// thread. Backends without persistence have nothing to do.
    fn flush(&self) -> FlushFuture<'_> {
        Box::pin(std::future::ready(Ok(())))
    }
}

/// Smallest byte string greater than every key starting with `prefix`.
///
/// `None` when no such bound exists (empty prefix or all `0xFF`).
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xFF {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Key range covering a scan request, or `None` when the range is empty.
pub fn scan_bounds(
    prefix: &[u8],
    start_after: Option<&[u8]>,
    direction: Direction,
) -> Option<(Bound<Vec<u8>>, Bound<Vec<u8>>)> {
    let upper = match prefix_successor(prefix) {
        Some(end) => Bound::Excluded(end),
        None => Bound::Unbounded,
    };
    let lower = Bound::Included(prefix.to_vec());

    match start_after {
        None => Some((lower, upper)),
        Some(cursor) if !cursor.starts_with(prefix) => None,
        Some(cursor) => match direction {
            Direction::Forward => Some((Bound::Excluded(cursor.to_vec()), upper)),
            Direction::Reverse => {
                if cursor == prefix {
                    return None;
                }
                Some((lower, Bound::Excluded(cursor.to_vec())))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_successor() {
        assert_eq!(prefix_successor(b"ab"), Some(b"ac".to_vec()));
        assert_eq!(prefix_successor(&[0x01, 0xFF]), Some(vec![0x02]));
        assert_eq!(prefix_successor(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_successor(b""), None);
    }

    #[test]
    fn test_scan_bounds_rejects_foreign_cursor() {
        assert!(scan_bounds(b"ab", Some(b"zz"), Direction::Reverse).is_none());
    }

    #[test]
    fn test_scan_bounds_reverse_with_cursor() {
        let (lower, upper) = scan_bounds(b"ab", Some(b"ab5"), Direction::Reverse).unwrap();
        assert_eq!(lower, Bound::Included(b"ab".to_vec()));
        assert_eq!(upper, Bound::Excluded(b"ab5".to_vec()));
    }
}
