//! Durable backend on top of sled.

use std::ops::Bound;
use std::path::Path;

use sled::{Batch, Db};

use crate::backend::{BackendKind, Direction, FlushFuture, KvBackend, RawPair, scan_bounds};
use crate::error::{StoreError, StoreResult};

/// Persistent ordered key-value storage in a sled database.
///
/// Mutations land in sled's page cache; [`KvBackend::flush`] writes them
/// to disk on the blocking pool.
#[derive(Debug, Clone)]
pub struct SledBackend {
    db: Db,
}

impl SledBackend {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "Opening durable key-value store");
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn collect<I>(iter: I, limit: usize) -> StoreResult<Vec<RawPair>>
    where
        I: Iterator<Item = sled::Result<(sled::IVec, sled::IVec)>>,
    {
        let mut rows = Vec::new();
        for item in iter.take(limit) {
            let (key, value) = item?;
            rows.push((key.to_vec(), value.to_vec()));
        }
        Ok(rows)
    }
}

impl KvBackend for SledBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Durable
    }

    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    fn insert(&self, key: &[u8], value: Vec<u8>) -> StoreResult<()> {
        self.db.insert(key, value)?;
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.db.remove(key)?.is_some())
    }

    fn insert_batch(&self, pairs: Vec<RawPair>) -> StoreResult<()> {
        let mut batch = Batch::default();
        for (key, value) in pairs {
            batch.insert(key, value);
        }
        self.db.apply_batch(batch)?;
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
        let range = self.db.range::<Vec<u8>, (Bound<Vec<u8>>, Bound<Vec<u8>>)>(bounds);

        match direction {
            Direction::Forward => Self::collect(range, limit),
            Direction::Reverse => Self::collect(range.rev(), limit),
        }
    }

    fn count_prefix(&self, prefix: &[u8]) -> StoreResult<u64> {
        let mut count = 0;
        for item in self.db.scan_prefix(prefix).keys() {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn flush(&self) -> FlushFuture<'_> {
        let db = self.db.clone();
        Box::pin(async move {
            let flushed = tokio::task::spawn_blocking(move || db.flush())
                .await
                .map_err(|e| StoreError::Unavailable(format!("flush task failed: {}", e)))??;
            tracing::trace!(bytes = flushed, "Flushed durable store");
            Ok(())
        })
    }
}
