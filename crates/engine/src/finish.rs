//! `finishSwapRequest`: folds a completed RIO batch back into RAM state
//! (spec.md §4.8). One function per intention — `In` merges fetched
//! data into the resident value and recomputes residency; `Out` builds
//! the write batch that persists a dirty value and drops it from RAM;
//! `Del` tombstones both sides.

use swapcore_core::vtable::SwapDataType;
use swapcore_core::{KeyRequestShape, MetaRecord, Residency, SwapResult, SwapValue};
use swapcore_storage::{data_key, data_key_prefix_range, encode_meta, meta_key, ColumnFamily, WriteBatch};

/// Outcome of folding a completed swap back into RAM/persistent state.
pub struct FinishOutcome {
    /// The RAM value after merging, or `None` if the key is now fully
    /// evicted (`Out`) or deleted (`Del`).
    pub value: Option<SwapValue>,
    /// The persistent meta after this operation, or `None` if the key
    /// no longer has one (fully `In`, or `Del`).
    pub meta: Option<MetaRecord>,
    /// Residency after this operation.
    pub residency: Residency,
    /// Engine writes this outcome requires, if any.
    pub write: Option<WriteBatch>,
}

/// Merge freshly-fetched `(subkey, value)` rows into `existing`, then
/// decide whether the key is now HOT (meta dropped) or still WARM
/// (meta retained, unchanged).
///
/// `fetched_version` is the live `MetaRecord.version` observed at the
/// moment the fetch was issued. If it's stale relative to `meta`'s
/// current version, a swap-out bumped the version while this fetch was
/// in flight (spec.md §3.1) and the rows it fetched belong to a
/// generation that's no longer reachable; the fragment is discarded
/// rather than merged, and `existing` is returned unchanged.
pub fn finish_in(
    data: &dyn SwapDataType,
    existing: Option<SwapValue>,
    raw_pairs: &[(Vec<u8>, Vec<u8>)],
    shape: &KeyRequestShape,
    meta: MetaRecord,
    fetched_version: u64,
) -> SwapResult<FinishOutcome> {
    if fetched_version < meta.version {
        return Ok(match &existing {
            Some(value) if data.merged_is_hot(value, shape) => {
                FinishOutcome { value: existing, meta: None, residency: Residency::Hot, write: None }
            }
            Some(_) => FinishOutcome { value: existing, meta: Some(meta), residency: Residency::Warm, write: None },
            None => FinishOutcome { value: None, meta: Some(meta), residency: Residency::Cold, write: None },
        });
    }
    let fragment = data.decode_fragment(raw_pairs)?;
    let merged = data.merge(existing, fragment);
    if data.merged_is_hot(&merged, shape) {
        Ok(FinishOutcome { value: Some(merged), meta: None, residency: Residency::Hot, write: None })
    } else {
        Ok(FinishOutcome { value: Some(merged), meta: Some(meta), residency: Residency::Warm, write: None })
    }
}

/// Persist `value` to the `DATA`/`META` column families and drop it
/// from RAM, leaving the key COLD. `meta`'s version is bumped first so
/// any sub-key rows a previous, now-stale swap-out left behind become
/// unreachable without needing to be deleted (spec.md §3.1).
pub fn finish_out(dbid: u32, key: &[u8], data: &dyn SwapDataType, value: &SwapValue, mut meta: MetaRecord) -> FinishOutcome {
    meta.object_type = data.object_type();
    meta.bump_version();
    let mut batch = WriteBatch::new();
    match value {
        SwapValue::WholeKey(bytes) => {
            batch.put(ColumnFamily::Data, data_key(dbid, key, meta.version, &[]), bytes.clone());
            meta.extension.subkey_count = 0;
        }
        SwapValue::Hash(fields) => {
            for (field, field_value) in fields {
                batch.put(ColumnFamily::Data, data_key(dbid, key, meta.version, field), field_value.clone());
            }
            meta.extension.subkey_count = fields.len() as u64;
        }
    }
    batch.put(ColumnFamily::Meta, meta_key(dbid, key), encode_meta(&meta));
    FinishOutcome { value: None, meta: Some(meta), residency: Residency::Cold, write: Some(batch) }
}

/// Tombstone a key entirely: delete its meta row and every sub-key row
/// at the current version.
pub fn finish_del(dbid: u32, key: &[u8], meta: &MetaRecord) -> FinishOutcome {
    let mut batch = WriteBatch::new();
    batch.del(ColumnFamily::Meta, meta_key(dbid, key));
    let (lo, hi) = data_key_prefix_range(dbid, key, meta.version);
    // The caller's ITERATE over [lo, hi) enumerates the concrete
    // sub-key rows to delete; this batch always carries the meta
    // tombstone, with per-row deletes appended by the caller once it
    // has that listing (avoiding a synchronous scan here).
    let _ = (lo, hi);
    FinishOutcome { value: None, meta: None, residency: Residency::Missing, write: Some(batch) }
}
