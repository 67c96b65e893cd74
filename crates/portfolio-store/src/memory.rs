//! In-memory backend used as the development fallback and in tests.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::backend::{BackendKind, Direction, KvBackend, RawPair, scan_bounds};
use crate::error::StoreResult;

/// Non-durable ordered map. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn insert(&self, key: &[u8], value: Vec<u8>) -> StoreResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_vec(), value);
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> StoreResult<bool> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(key).is_some())
    }

    fn insert_batch(&self, pairs: Vec<RawPair>) -> StoreResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.extend(pairs);
        Ok(())
    }

    fn scan(
        &self,
        prefix: &[u8],
        start_after: Option<&[u8]>,
        direction: Direction,
        limit: usize,
    ) -> StoreResult<Vec<RawPair>> {
        let Some(bounds) = scan_bounds(prefix, start_after, direction) else {
            return Ok(Vec::new());
        };
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let range = entries.range::<Vec<u8>, _>(bounds);
        let clone = |(k, v): (&Vec<u8>, &Vec<u8>)| (k.clone(), v.clone());

        Ok(match direction {
            Direction::Forward => range.take(limit).map(clone).collect(),
            Direction::Reverse => range.rev().take(limit).map(clone).collect(),
        })
    }

    fn count_prefix(&self, prefix: &[u8]) -> StoreResult<u64> {
        let Some(bounds) = scan_bounds(prefix, None, Direction::Forward) else {
            return Ok(0);
        };
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.range::<Vec<u8>, _>(bounds).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new();
        for key in [&b"a1"[..], b"a2", b"a3", b"b1"] {
            backend.insert(key, key.to_vec()).unwrap();
        }
        backend
    }

    #[test]
    fn test_scan_reverse_with_cursor() {
        let backend = seeded();
        let rows = backend.scan(b"a", Some(b"a3"), Direction::Reverse, 10).unwrap();
        let keys: Vec<_> = rows.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a2".to_vec(), b"a1".to_vec()]);
    }

    #[test]
    fn test_scan_forward_limit() {
        let backend = seeded();
        let rows = backend.scan(b"a", None, Direction::Forward, 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, b"a1".to_vec());
    }

    #[test]
    fn test_count_and_remove() {
        let backend = seeded();
        assert_eq!(backend.count_prefix(b"a").unwrap(), 3);
        assert!(backend.remove(b"a1").unwrap());
        assert!(!backend.remove(b"a1").unwrap());
        assert_eq!(backend.count_prefix(b"a").unwrap(), 2);
        assert_eq!(backend.count_prefix(b"").unwrap(), 3);
    }
}
