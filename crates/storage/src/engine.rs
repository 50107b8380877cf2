//! The abstract persistent-engine vocabulary (spec.md §6).

use crate::error::StorageResult;
use swapcore_core::vtable::ColumnFamily;

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Upsert `key` to `value` in `cf`.
    Put { cf: ColumnFamily, key: Vec<u8>, value: Vec<u8> },
    /// Remove `key` from `cf`.
    Del { cf: ColumnFamily, key: Vec<u8> },
}

/// An atomic group of [`WriteOp`]s, applied by `WRITE` (spec.md §6).
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// An empty batch.
    pub fn new() -> Self {
        WriteBatch { ops: Vec::new() }
    }

    /// Queue a put.
    pub fn put(&mut self, cf: ColumnFamily, key: Vec<u8>, value: Vec<u8>) -> &mut Self {
        self.ops.push(WriteOp::Put { cf, key, value });
        self
    }

    /// Queue a delete.
    pub fn del(&mut self, cf: ColumnFamily, key: Vec<u8>) -> &mut Self {
        self.ops.push(WriteOp::Del { cf, key });
        self
    }

    /// Fold another batch's operations into this one, preserving order.
    pub fn extend(&mut self, other: WriteBatch) {
        self.ops.extend(other.ops);
    }

    /// `true` if the batch has no queued operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The queued operations, in submission order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

/// The persistent KV engine behind the swap subsystem: an abstract
/// RocksDB-shaped vocabulary over two column families, `META` and
/// `DATA` (spec.md §6).
///
/// Implementations must be safe to call concurrently from every
/// background worker thread (spec.md §5: "All persistent KV handles are
/// process-wide and shared read-mostly").
pub trait PersistentEngine: Send + Sync {
    /// `GET(cf, rawkey) -> rawval | missing`.
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// `MULTIGET(cf[], rawkey[]) -> rawval[]`. Missing entries are `None`
    /// at the corresponding position; the result vector always has the
    /// same length as `keys`.
    fn multi_get(
        &self,
        requests: &[(ColumnFamily, Vec<u8>)],
    ) -> StorageResult<Vec<Option<Vec<u8>>>>;

    /// `WRITE(batch of PUT/DEL)` — applied atomically.
    fn write(&self, batch: WriteBatch) -> StorageResult<()>;

    /// `ITERATE(cf, lo, hi, limit) -> (rawkey, rawval)* with next_seek`.
    ///
    /// Returns up to `limit` pairs with `lo <= rawkey < hi` in ascending
    /// order, plus the rawkey to resume from (`None` once the range is
    /// exhausted).
    fn iterate(
        &self,
        cf: ColumnFamily,
        lo: &[u8],
        hi: &[u8],
        limit: usize,
    ) -> StorageResult<(Vec<(Vec<u8>, Vec<u8>)>, Option<Vec<u8>>)>;
}
