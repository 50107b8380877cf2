//! The persistent meta record: the per-key header stored in the `META`
//! column family (spec.md §3 invariant 1, §6 column families).

use crate::vtable::ObjectType;

/// Extension payload carried alongside the common meta fields; meaning is
/// type-specific (e.g. sub-key count for hashes, length for lists).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetaExtension {
    /// Number of sub-key records addressable under this meta's version,
    /// or 0 for whole-key types that never split into sub-keys.
    pub subkey_count: u64,
}

/// Persistent header for a COLD or WARM key.
///
/// Invariant (spec.md §3.1): every sub-key record carries the `version`
/// of its parent meta; a WARM → COLD transition logically deletes stale
/// sub-key records by incrementing `version` rather than issuing I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaRecord {
    /// Which vtable decodes/encodes this key's data.
    pub object_type: ObjectType,
    /// Absolute expiry in milliseconds since epoch, or `None` for no TTL.
    pub expire_at_ms: Option<i64>,
    /// Version stamped into every sub-key rawkey under this meta.
    pub version: u64,
    /// Type-specific extension.
    pub extension: MetaExtension,
}

impl MetaRecord {
    /// Build a fresh meta record for a key first becoming cold.
    pub fn new(object_type: ObjectType, expire_at_ms: Option<i64>) -> Self {
        MetaRecord {
            object_type,
            expire_at_ms,
            version: 1,
            extension: MetaExtension::default(),
        }
    }

    /// Logically delete every sub-key record under the current version by
    /// bumping the version counter. Sub-key records written at or below
    /// the previous version become unreachable without any I/O.
    pub fn bump_version(&mut self) -> u64 {
        self.version = self.version.checked_add(1).expect("meta version overflow");
        self.version
    }

    /// `true` if the key is logically expired as of `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.expire_at_ms, Some(t) if t <= now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_version_increments_and_is_monotonic() {
        let mut meta = MetaRecord::new(ObjectType::WholeKey, None);
        let v1 = meta.version;
        let v2 = meta.bump_version();
        assert!(v2 > v1);
    }

    #[test]
    fn expiry_check() {
        let meta = MetaRecord::new(ObjectType::WholeKey, Some(1000));
        assert!(meta.is_expired(1000));
        assert!(meta.is_expired(1001));
        assert!(!meta.is_expired(999));
    }
}
