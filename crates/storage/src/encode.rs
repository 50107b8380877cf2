//! Raw-key encoding for the `META` and `DATA` column families.
//!
//! Grounded on spec.md §4.2 "Versioning" and §6 ("Keys in both column
//! families carry the dbid prefix; data keys additionally encode the
//! parent version between key and sub-key"). Every integer is encoded
//! big-endian so that byte-lexicographic order matches numeric order —
//! required for `ITERATE` range scans to behave as ordinary cursors.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;
use swapcore_core::vtable::ObjectType;
use swapcore_core::MetaRecord;

/// Build a `META` column family rawkey: `dbid(4) || keylen(4) || key`.
pub fn meta_key(dbid: u32, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + key.len());
    out.write_u32::<BigEndian>(dbid).expect("vec write cannot fail");
    out.write_u32::<BigEndian>(key.len() as u32).expect("vec write cannot fail");
    out.extend_from_slice(key);
    out
}

/// Build a `DATA` column family rawkey for a sub-key record:
/// `dbid(4) || keylen(4) || key || version(8) || subkey`.
///
/// A whole-key type passes an empty `subkey`, which yields a single
/// unambiguous data-key per `(dbid, key, version)`.
pub fn data_key(dbid: u32, key: &[u8], version: u64, subkey: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + key.len() + subkey.len());
    out.write_u32::<BigEndian>(dbid).expect("vec write cannot fail");
    out.write_u32::<BigEndian>(key.len() as u32).expect("vec write cannot fail");
    out.extend_from_slice(key);
    out.write_u64::<BigEndian>(version).expect("vec write cannot fail");
    out.extend_from_slice(subkey);
    out
}

/// The lowest and highest possible `DATA` rawkeys for every sub-key of
/// `(dbid, key, version)` — a prefix range suitable for `ITERATE`.
///
/// The upper bound is `data_key(dbid, key, version + 1, &[])` rather
/// than the `(dbid, key, version)` prefix padded with `0xff` bytes: a
/// subkey is caller-controlled and may itself contain any number of
/// `0xff` bytes, so no fixed-width padding can bound it correctly.
/// Since `version` is encoded as a fixed-width big-endian integer
/// immediately before the subkey, every rawkey sharing `(dbid, key,
/// version)` sorts strictly between the two bounds regardless of what
/// bytes the subkey holds.
pub fn data_key_prefix_range(dbid: u32, key: &[u8], version: u64) -> (Vec<u8>, Vec<u8>) {
    let lo = data_key(dbid, key, version, &[]);
    let hi = data_key(dbid, key, version.wrapping_add(1), &[]);
    (lo, hi)
}

/// Parsed form of a `DATA` rawkey, as returned by [`parse_data_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDataKey {
    /// Database index the key belongs to.
    pub dbid: u32,
    /// The user-visible key name.
    pub key: Vec<u8>,
    /// The parent meta version this sub-key record was written under.
    pub version: u64,
    /// The sub-key (empty for whole-key records).
    pub subkey: Vec<u8>,
}

/// Decode bytes previously produced by [`data_key`].
pub fn parse_data_key(raw: &[u8]) -> Option<ParsedDataKey> {
    let mut cur = Cursor::new(raw);
    let dbid = cur.read_u32::<BigEndian>().ok()?;
    let keylen = cur.read_u32::<BigEndian>().ok()? as usize;
    let pos = cur.position() as usize;
    if raw.len() < pos + keylen {
        return None;
    }
    let key = raw[pos..pos + keylen].to_vec();
    cur.set_position((pos + keylen) as u64);
    let version = cur.read_u64::<BigEndian>().ok()?;
    let subkey_start = cur.position() as usize;
    let subkey = raw[subkey_start..].to_vec();
    Some(ParsedDataKey { dbid, key, version, subkey })
}

fn object_type_tag(object_type: ObjectType) -> u8 {
    match object_type {
        ObjectType::WholeKey => 0,
        ObjectType::Hash => 1,
        ObjectType::List => 2,
        ObjectType::Set => 3,
        ObjectType::ZSet => 4,
        ObjectType::Stream => 5,
    }
}

fn object_type_from_tag(tag: u8) -> Option<ObjectType> {
    match tag {
        0 => Some(ObjectType::WholeKey),
        1 => Some(ObjectType::Hash),
        2 => Some(ObjectType::List),
        3 => Some(ObjectType::Set),
        4 => Some(ObjectType::ZSet),
        5 => Some(ObjectType::Stream),
        _ => None,
    }
}

/// Serialize a [`MetaRecord`] for storage in the `META` column family:
/// `object_type(1) || has_expire(1) || expire_at_ms(8) || version(8) ||
/// subkey_count(8)`.
pub fn encode_meta(meta: &MetaRecord) -> Vec<u8> {
    let mut out = Vec::with_capacity(26);
    out.push(object_type_tag(meta.object_type));
    out.push(meta.expire_at_ms.is_some() as u8);
    out.write_i64::<BigEndian>(meta.expire_at_ms.unwrap_or(0)).expect("vec write cannot fail");
    out.write_u64::<BigEndian>(meta.version).expect("vec write cannot fail");
    out.write_u64::<BigEndian>(meta.extension.subkey_count).expect("vec write cannot fail");
    out
}

/// Inverse of [`encode_meta`].
pub fn decode_meta(raw: &[u8]) -> Option<MetaRecord> {
    let mut cur = Cursor::new(raw);
    let object_type = object_type_from_tag(cur.read_u8().ok()?)?;
    let has_expire = cur.read_u8().ok()? != 0;
    let expire_raw = cur.read_i64::<BigEndian>().ok()?;
    let version = cur.read_u64::<BigEndian>().ok()?;
    let subkey_count = cur.read_u64::<BigEndian>().ok()?;
    Some(MetaRecord {
        object_type,
        expire_at_ms: if has_expire { Some(expire_raw) } else { None },
        version,
        extension: swapcore_core::meta::MetaExtension { subkey_count },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_key_round_trips() {
        let raw = data_key(3, b"myhash", 7, b"field1");
        let parsed = parse_data_key(&raw).expect("parses");
        assert_eq!(parsed.dbid, 3);
        assert_eq!(parsed.key, b"myhash");
        assert_eq!(parsed.version, 7);
        assert_eq!(parsed.subkey, b"field1");
    }

    #[test]
    fn whole_key_has_empty_subkey() {
        let raw = data_key(0, b"foo", 1, &[]);
        let parsed = parse_data_key(&raw).expect("parses");
        assert!(parsed.subkey.is_empty());
    }

    #[test]
    fn sort_order_matches_numeric_version_order() {
        let k1 = data_key(0, b"h", 1, b"a");
        let k2 = data_key(0, b"h", 2, b"a");
        assert!(k1 < k2, "version 1 record must sort before version 2");
    }

    #[test]
    fn prefix_range_bounds_subkeys_with_many_leading_0xff_bytes() {
        // A subkey made entirely of 0xff bytes, longer than any fixed
        // padding could safely bound, must still fall inside the
        // range for its own version and outside the next one.
        let (lo, hi) = data_key_prefix_range(0, b"h", 5);
        let wide_subkey = data_key(0, b"h", 5, &[0xff; 16]);
        assert!(wide_subkey >= lo && wide_subkey < hi);

        let next_version = data_key(0, b"h", 6, b"a");
        assert!(next_version >= hi, "a row at the next version must not be included");
    }

    #[test]
    fn meta_record_round_trips() {
        let meta = MetaRecord {
            object_type: ObjectType::Hash,
            expire_at_ms: Some(123),
            version: 9,
            extension: swapcore_core::meta::MetaExtension { subkey_count: 4 },
        };
        let raw = encode_meta(&meta);
        assert_eq!(decode_meta(&raw), Some(meta));
    }

    #[test]
    fn meta_record_with_no_expiry_round_trips() {
        let meta = MetaRecord {
            object_type: ObjectType::WholeKey,
            expire_at_ms: None,
            version: 1,
            extension: swapcore_core::meta::MetaExtension::default(),
        };
        let raw = encode_meta(&meta);
        assert_eq!(decode_meta(&raw), Some(meta));
    }

    #[test]
    fn meta_key_distinguishes_dbid() {
        let a = meta_key(0, b"x");
        let b = meta_key(1, b"x");
        assert_ne!(a, b);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Spec property 5 applied to the raw-key codec: every data-key
        /// built by [`data_key`] parses back to the exact fields it was
        /// built from, for any dbid/key/version/subkey combination.
        #[test]
        fn data_key_round_trip(
            dbid in any::<u32>(),
            key in prop::collection::vec(any::<u8>(), 0..32),
            version in any::<u64>(),
            subkey in prop::collection::vec(any::<u8>(), 0..32),
        ) {
            let raw = data_key(dbid, &key, version, &subkey);
            let parsed = parse_data_key(&raw).expect("a key built by data_key always parses");
            prop_assert_eq!(parsed.dbid, dbid);
            prop_assert_eq!(parsed.key, key);
            prop_assert_eq!(parsed.version, version);
            prop_assert_eq!(parsed.subkey, subkey);
        }

        /// Spec property 5 applied to the meta codec:
        /// `decode_meta(encode_meta(m)) == m` for any well-formed
        /// [`MetaRecord`].
        #[test]
        fn meta_round_trip(
            object_type_tag in 0u8..6,
            has_expire in any::<bool>(),
            expire_at_ms in any::<i64>(),
            version in any::<u64>(),
            subkey_count in any::<u64>(),
        ) {
            let object_type = object_type_from_tag(object_type_tag).unwrap();
            let meta = MetaRecord {
                object_type,
                expire_at_ms: has_expire.then_some(expire_at_ms),
                version,
                extension: swapcore_core::meta::MetaExtension { subkey_count },
            };
            let raw = encode_meta(&meta);
            prop_assert_eq!(decode_meta(&raw), Some(meta));
        }
    }
}
