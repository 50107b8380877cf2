//! Vtable for [`ObjectType::Hash`]: a field-addressable aggregate that
//! can be partially resident (spec.md §4.2, the one sub-key-addressable
//! type the spec requires).

use rustc_hash::FxHashMap;
use swapcore_core::vtable::{MissingSubkeys, ObjectType, RioAction, SwapAnaInput, SwapDataType};
use swapcore_core::{Intention, IntentionFlags, KeyRequestShape, Residency, SwapResult, SwapValue};

pub struct HashData;

impl SwapDataType for HashData {
    fn object_type(&self) -> ObjectType {
        ObjectType::Hash
    }

    fn swap_ana(&self, input: &SwapAnaInput) -> (Intention, IntentionFlags) {
        match (input.residency, input.cmd_intention) {
            (Residency::Hot, _) => (Intention::Nop, input.cmd_intention_flags),
            (Residency::Warm, Intention::Nop) => (Intention::In, input.cmd_intention_flags),
            (Residency::Cold, Intention::Nop) => (Intention::In, input.cmd_intention_flags),
            (_, other) => (other, input.cmd_intention_flags),
        }
    }

    fn swap_ana_action(&self, intention: Intention, shape: &KeyRequestShape) -> RioAction {
        match intention {
            Intention::Nop => RioAction::Nop,
            // An explicit sub-key list (HGET/HDEL-style) only needs
            // those rows plus the meta row: a MULTIGET, matching
            // spec.md §8 scenario 2 exactly ("one MULTIGET over
            // {meta(h), data(h, version, f2)}"). Any other shape means
            // the whole value is wanted (HGETALL-style), which has no
            // known sub-key list up front and must ITERATE the parent
            // version's key range instead.
            Intention::In => match shape {
                KeyRequestShape::SubKeys(_) => RioAction::MultiGet,
                _ => RioAction::Iterate,
            },
            Intention::Out | Intention::Del => RioAction::Write,
            Intention::Util => RioAction::Nop,
        }
    }

    fn missing_subkeys(&self, existing: Option<&SwapValue>, shape: &KeyRequestShape) -> MissingSubkeys {
        let resident = existing.and_then(SwapValue::as_hash);
        match (resident, shape) {
            (None, _) => MissingSubkeys::All,
            (Some(_), KeyRequestShape::WholeKey) => {
                // Whether every persisted field is already resident is a
                // property of the meta's subkey_count, not of the value
                // alone; the caller cross-checks that count before
                // treating this as authoritative.
                MissingSubkeys::None
            }
            (Some(map), KeyRequestShape::SubKeys(fields)) => {
                let missing: Vec<Vec<u8>> =
                    fields.iter().filter(|f| !map.contains_key(f.as_slice())).cloned().collect();
                if missing.is_empty() {
                    MissingSubkeys::None
                } else {
                    MissingSubkeys::Explicit(missing)
                }
            }
            (Some(_), _) => MissingSubkeys::None,
        }
    }

    fn decode_fragment(&self, raw_pairs: &[(Vec<u8>, Vec<u8>)]) -> SwapResult<SwapValue> {
        let mut map = FxHashMap::default();
        for (field, value) in raw_pairs {
            map.insert(field.clone(), value.clone());
        }
        Ok(SwapValue::Hash(map))
    }

    fn merge(&self, existing: Option<SwapValue>, fragment: SwapValue) -> SwapValue {
        let fragment_map = match fragment {
            SwapValue::Hash(m) => m,
            SwapValue::WholeKey(_) => return fragment,
        };
        match existing {
            Some(SwapValue::Hash(mut map)) => {
                map.extend(fragment_map);
                SwapValue::Hash(map)
            }
            _ => SwapValue::Hash(fragment_map),
        }
    }

    fn merged_is_hot(&self, value: &SwapValue, shape: &KeyRequestShape) -> bool {
        let Some(map) = value.as_hash() else { return false };
        match shape {
            KeyRequestShape::SubKeys(fields) => fields.iter().all(|f| map.contains_key(f.as_slice())),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn missing_subkeys_reports_only_absent_fields() {
        let data = HashData;
        let mut map = FxHashMap::default();
        map.insert(b"a".to_vec(), b"1".to_vec());
        let value = SwapValue::Hash(map);
        let shape = KeyRequestShape::SubKeys(Arc::from(vec![b"a".to_vec(), b"b".to_vec()]));
        let missing = data.missing_subkeys(Some(&value), &shape);
        assert_eq!(missing, MissingSubkeys::Explicit(vec![b"b".to_vec()]));
    }

    #[test]
    fn merge_extends_existing_fields() {
        let data = HashData;
        let mut existing = FxHashMap::default();
        existing.insert(b"a".to_vec(), b"1".to_vec());
        let mut fragment = FxHashMap::default();
        fragment.insert(b"b".to_vec(), b"2".to_vec());
        let merged = data.merge(Some(SwapValue::Hash(existing)), SwapValue::Hash(fragment));
        let map = merged.as_hash().unwrap();
        assert_eq!(map.get(b"a".as_slice()), Some(&b"1".to_vec()));
        assert_eq!(map.get(b"b".as_slice()), Some(&b"2".to_vec()));
    }

    #[test]
    fn merged_is_hot_checks_requested_fields_only() {
        let data = HashData;
        let mut map = FxHashMap::default();
        map.insert(b"a".to_vec(), b"1".to_vec());
        let value = SwapValue::Hash(map);
        let shape = KeyRequestShape::SubKeys(Arc::from(vec![b"a".to_vec()]));
        assert!(data.merged_is_hot(&value, &shape));
        let shape2 = KeyRequestShape::SubKeys(Arc::from(vec![b"a".to_vec(), b"missing".to_vec()]));
        assert!(!data.merged_is_hot(&value, &shape2));
    }
}
