//! RAM-side database state: the dictionary, the `db.expires` TTL index,
//! and the `db.cold_keys` counter (spec.md §3 invariants 3-4), kept in
//! sync with the persistent side by [`crate::executor::Executor`] as it
//! folds completed swaps back in (spec.md §4.8 `finishSwapRequest`).
//!
//! This module owns only the bookkeeping; the actual swap-in/out/del
//! logic that produces the values it is told to install lives in
//! `swapcore-engine::finish`.

use rustc_hash::FxHashMap;
use swapcore_core::vtable::ObjectType;
use swapcore_core::{MetaRecord, Residency, SwapValue};

/// One logical database: a RAM dictionary plus the meta/TTL shadow
/// state needed to classify a key's residency without touching the
/// persistent engine (spec.md §3 residency table).
#[derive(Default)]
pub struct Database {
    dict: FxHashMap<Vec<u8>, SwapValue>,
    metas: FxHashMap<Vec<u8>, MetaRecord>,
    expires: FxHashMap<Vec<u8>, i64>,
    cold_keys: usize,
}

impl Database {
    /// An empty database.
    pub fn new() -> Self {
        Database::default()
    }

    /// Residency of `key`, per spec.md §3's table.
    pub fn residency(&self, key: &[u8]) -> Residency {
        Residency::classify(self.dict.contains_key(key), self.metas.contains_key(key))
    }

    /// The RAM-resident value, if any (HOT or WARM).
    pub fn value(&self, key: &[u8]) -> Option<&SwapValue> {
        self.dict.get(key)
    }

    /// The persistent meta record, if any (COLD or WARM).
    pub fn meta(&self, key: &[u8]) -> Option<&MetaRecord> {
        self.metas.get(key)
    }

    /// Current TTL, if any. Per invariant 3, this is populated whenever
    /// the key is not COLD (i.e. some RAM value is resident) and empty
    /// when COLD (the TTL then lives only in the meta record).
    pub fn expire_at(&self, key: &[u8]) -> Option<i64> {
        self.expires.get(key).copied()
    }

    /// Number of keys in states COLD or WARM (invariant 4).
    pub fn cold_keys(&self) -> usize {
        self.cold_keys
    }

    /// The object type a fresh key-request against `key` should assume
    /// when nothing is resident yet: the type recorded in a cold meta,
    /// or the type of whatever RAM value already exists.
    pub fn object_type_hint(&self, key: &[u8]) -> Option<ObjectType> {
        if let Some(meta) = self.metas.get(key) {
            return Some(meta.object_type);
        }
        match self.dict.get(key) {
            Some(SwapValue::WholeKey(_)) => Some(ObjectType::WholeKey),
            Some(SwapValue::Hash(_)) => Some(ObjectType::Hash),
            None => None,
        }
    }

    /// Install a value directly as HOT, bypassing the swap pipeline's
    /// merge step: used by commands whose semantics unconditionally
    /// overwrite (e.g. `SET`, `IN_OVERWRITE`). Drops any stale cold meta
    /// for this key; the data and meta rows it pointed at become
    /// unreachable garbage for a future compaction to reclaim, the same
    /// way a version bump logically deletes stale sub-key rows
    /// (spec.md §3 invariant 2) rather than requiring synchronous I/O.
    pub fn install_hot(&mut self, key: Vec<u8>, value: SwapValue, ttl_at_ms: Option<i64>) {
        let was_cold = self.residency(&key).counts_as_cold();
        self.metas.remove(&key);
        self.dict.insert(key.clone(), value);
        match ttl_at_ms {
            Some(t) => {
                self.expires.insert(key, t);
            }
            None => {
                self.expires.remove(&key);
            }
        }
        if was_cold {
            self.cold_keys -= 1;
        }
    }

    /// Fold a completed full swap-IN: the merged value now satisfies
    /// the whole key, so any meta record is dropped and the key becomes
    /// HOT (spec.md §4.8 "move TTL from meta to `db.expires` and
    /// decrement `cold_keys`").
    pub fn apply_in_full(&mut self, key: &[u8], value: SwapValue) {
        if let Some(meta) = self.metas.remove(key) {
            self.set_expire(key, meta.expire_at_ms);
            self.cold_keys -= 1;
        }
        self.dict.insert(key.to_vec(), value);
    }

    /// Fold a completed partial swap-IN: the key stays WARM because the
    /// vtable reports the merged value still doesn't cover everything
    /// the request's shape needs. The meta record is retained (so
    /// future fetches know what is still missing) but the TTL is
    /// mirrored into `db.expires` now that a RAM value exists.
    pub fn apply_in_partial(&mut self, key: &[u8], value: SwapValue, meta: MetaRecord) {
        self.set_expire(key, meta.expire_at_ms);
        self.dict.insert(key.to_vec(), value);
        self.metas.insert(key.to_vec(), meta);
    }

    /// Fold a completed swap-OUT: the value is persisted and dropped
    /// from RAM, the key becomes COLD. The TTL moves from `db.expires`
    /// back into the written meta record.
    pub fn apply_out(&mut self, key: &[u8], mut meta: MetaRecord) {
        let was_cold = self.residency(key).counts_as_cold();
        meta.expire_at_ms = self.expires.remove(key);
        self.dict.remove(key);
        self.metas.insert(key.to_vec(), meta);
        if !was_cold {
            self.cold_keys += 1;
        }
    }

    /// Fold a completed delete: remove the key from every index.
    pub fn apply_del(&mut self, key: &[u8]) {
        let was_cold = self.residency(key).counts_as_cold();
        self.dict.remove(key);
        self.metas.remove(key);
        self.expires.remove(key);
        if was_cold {
            self.cold_keys -= 1;
        }
    }

    /// Merge `fields` directly into the resident hash at `key`, creating
    /// an empty hash if nothing is resident yet. Used by `HSET`, which —
    /// unlike `SET` — only ever overwrites the fields it names and must
    /// leave any other persisted-but-not-yet-fetched fields alone.
    ///
    /// If a meta record already exists for `key`, its TTL is mirrored
    /// into `db.expires` (the key is now WARM rather than purely COLD,
    /// per invariant 3); `cold_keys` is unaffected because WARM still
    /// counts as cold.
    pub fn upsert_hash_fields(&mut self, key: &[u8], fields: Vec<(Vec<u8>, Vec<u8>)>) {
        match self.dict.get_mut(key) {
            Some(SwapValue::Hash(map)) => {
                for (field, value) in fields {
                    map.insert(field, value);
                }
            }
            _ => {
                let mut map = FxHashMap::default();
                for (field, value) in fields {
                    map.insert(field, value);
                }
                self.dict.insert(key.to_vec(), SwapValue::Hash(map));
            }
        }
        if let Some(ttl) = self.metas.get(key).and_then(|m| m.expire_at_ms) {
            self.expires.insert(key.to_vec(), ttl);
        }
    }

    /// Remove `fields` from the resident hash at `key`, returning how
    /// many were actually present. If the hash is left with no fields,
    /// the key is dropped entirely through [`Self::apply_del`], mirroring
    /// `HDEL` deleting a key once its last field is gone.
    pub fn remove_hash_fields(&mut self, key: &[u8], fields: &[Vec<u8>]) -> usize {
        let mut removed = 0;
        let now_empty = match self.dict.get_mut(key) {
            Some(SwapValue::Hash(map)) => {
                for field in fields {
                    if map.remove(field.as_slice()).is_some() {
                        removed += 1;
                    }
                }
                map.is_empty()
            }
            _ => return 0,
        };
        if now_empty {
            self.apply_del(key);
        }
        removed
    }

    /// Every key currently HOT or WARM (has a RAM value), used by the
    /// reference SCAN handler to union in hot keys the persistent
    /// engine never learns about.
    pub fn hot_key_names(&self) -> impl Iterator<Item = &[u8]> {
        self.dict.keys().map(|k| k.as_slice())
    }

    fn set_expire(&mut self, key: &[u8], ttl_at_ms: Option<i64>) {
        match ttl_at_ms {
            Some(t) => {
                self.expires.insert(key.to_vec(), t);
            }
            None => {
                self.expires.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swapcore_core::vtable::ObjectType;

    #[test]
    fn install_hot_makes_a_fresh_key_hot_with_no_meta() {
        let mut db = Database::new();
        db.install_hot(b"k".to_vec(), SwapValue::WholeKey(b"v".to_vec()), None);
        assert_eq!(db.residency(b"k"), Residency::Hot);
        assert_eq!(db.cold_keys(), 0);
    }

    #[test]
    fn apply_in_full_drops_meta_and_decrements_cold_keys() {
        let mut db = Database::new();
        db.apply_out(b"k", MetaRecord::new(ObjectType::WholeKey, Some(1000)));
        assert_eq!(db.residency(b"k"), Residency::Cold);
        assert_eq!(db.cold_keys(), 1);

        db.apply_in_full(b"k", SwapValue::WholeKey(b"v".to_vec()));
        assert_eq!(db.residency(b"k"), Residency::Hot);
        assert_eq!(db.cold_keys(), 0);
        assert_eq!(db.expire_at(b"k"), Some(1000));
    }

    #[test]
    fn apply_in_partial_keeps_warm_and_mirrors_ttl() {
        let mut db = Database::new();
        let meta = MetaRecord::new(ObjectType::Hash, Some(500));
        db.apply_in_partial(b"h", SwapValue::Hash(Default::default()), meta);
        assert_eq!(db.residency(b"h"), Residency::Warm);
        assert_eq!(db.cold_keys(), 1);
        assert_eq!(db.expire_at(b"h"), Some(500));
    }

    #[test]
    fn apply_out_counts_exactly_one_transition() {
        let mut db = Database::new();
        db.install_hot(b"k".to_vec(), SwapValue::WholeKey(b"v".to_vec()), Some(42));
        db.apply_out(b"k", MetaRecord::new(ObjectType::WholeKey, None));
        assert_eq!(db.residency(b"k"), Residency::Cold);
        assert_eq!(db.cold_keys(), 1);
        assert_eq!(db.meta(b"k").unwrap().expire_at_ms, Some(42));
        assert_eq!(db.expire_at(b"k"), None);
    }

    #[test]
    fn apply_del_removes_every_index() {
        let mut db = Database::new();
        db.install_hot(b"k".to_vec(), SwapValue::WholeKey(b"v".to_vec()), Some(1));
        db.apply_del(b"k");
        assert_eq!(db.residency(b"k"), Residency::Missing);
        assert_eq!(db.cold_keys(), 0);
        assert!(db.expire_at(b"k").is_none());
    }

    #[test]
    fn remove_hash_fields_counts_only_present_fields() {
        let mut db = Database::new();
        db.upsert_hash_fields(b"h", vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())]);
        let removed = db.remove_hash_fields(b"h", &[b"a".to_vec(), b"missing".to_vec()]);
        assert_eq!(removed, 1);
        assert_eq!(db.residency(b"h"), Residency::Hot);
    }

    #[test]
    fn remove_hash_fields_deletes_key_once_emptied() {
        let mut db = Database::new();
        db.upsert_hash_fields(b"h", vec![(b"a".to_vec(), b"1".to_vec())]);
        db.remove_hash_fields(b"h", &[b"a".to_vec()]);
        assert_eq!(db.residency(b"h"), Residency::Missing);
    }
}
