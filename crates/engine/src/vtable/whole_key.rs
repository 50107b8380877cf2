//! Vtable for [`ObjectType::WholeKey`]: a single opaque blob with no
//! sub-key granularity, so swap is always all-or-nothing.

use swapcore_core::vtable::{MissingSubkeys, ObjectType, RioAction, SwapAnaInput, SwapDataType};
use swapcore_core::{Intention, IntentionFlags, KeyRequestShape, Residency, SwapError, SwapResult, SwapValue};

pub struct WholeKeyData;

impl SwapDataType for WholeKeyData {
    fn object_type(&self) -> ObjectType {
        ObjectType::WholeKey
    }

    fn swap_ana(&self, input: &SwapAnaInput) -> (Intention, IntentionFlags) {
        match (input.residency, input.cmd_intention) {
            (Residency::Hot, _) => (Intention::Nop, input.cmd_intention_flags),
            (Residency::Warm, _) => {
                // A whole-key type has no partial WARM state of its own;
                // WARM here only happens transiently mid-transition and
                // resolves the same way COLD does.
                (input.cmd_intention, input.cmd_intention_flags)
            }
            (Residency::Cold, Intention::Nop) => (Intention::In, input.cmd_intention_flags),
            (Residency::Cold, other) => (other, input.cmd_intention_flags),
            (Residency::Missing, _) => (Intention::Nop, input.cmd_intention_flags),
        }
    }

    fn swap_ana_action(&self, intention: Intention, _shape: &KeyRequestShape) -> RioAction {
        match intention {
            Intention::Nop => RioAction::Nop,
            Intention::In => RioAction::MultiGet,
            Intention::Out => RioAction::Write,
            Intention::Del => RioAction::Write,
            Intention::Util => RioAction::Nop,
        }
    }

    fn missing_subkeys(&self, existing: Option<&SwapValue>, _shape: &KeyRequestShape) -> MissingSubkeys {
        match existing {
            Some(_) => MissingSubkeys::None,
            None => MissingSubkeys::All,
        }
    }

    fn decode_fragment(&self, raw_pairs: &[(Vec<u8>, Vec<u8>)]) -> SwapResult<SwapValue> {
        match raw_pairs.first() {
            Some((_, value)) => Ok(SwapValue::WholeKey(value.clone())),
            None => Err(SwapError::Decode { key: Vec::new(), reason: "whole-key fetch returned no rows".into() }),
        }
    }

    fn merge(&self, existing: Option<SwapValue>, fragment: SwapValue) -> SwapValue {
        // A whole-key value is never partial: the fragment always
        // replaces whatever was there, matching `createOrMergeObject`
        // for a type with no sub-key granularity.
        let _ = existing;
        fragment
    }

    fn merged_is_hot(&self, _value: &SwapValue, _shape: &KeyRequestShape) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_nop_becomes_in() {
        let data = WholeKeyData;
        let input = SwapAnaInput {
            residency: Residency::Cold,
            cmd_intention: Intention::Nop,
            cmd_intention_flags: IntentionFlags::empty(),
            value_dirty: false,
        };
        assert_eq!(data.swap_ana(&input).0, Intention::In);
    }

    #[test]
    fn hot_is_always_nop() {
        let data = WholeKeyData;
        let input = SwapAnaInput {
            residency: Residency::Hot,
            cmd_intention: Intention::Out,
            cmd_intention_flags: IntentionFlags::empty(),
            value_dirty: true,
        };
        assert_eq!(data.swap_ana(&input).0, Intention::Nop);
    }

    #[test]
    fn merge_replaces_whole_value() {
        let data = WholeKeyData;
        let merged = data.merge(Some(SwapValue::WholeKey(b"old".to_vec())), SwapValue::WholeKey(b"new".to_vec()));
        assert_eq!(merged.as_whole_key(), Some(b"new".as_slice()));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_intention() -> impl Strategy<Value = Intention> {
        prop_oneof![
            Just(Intention::Nop),
            Just(Intention::In),
            Just(Intention::Out),
            Just(Intention::Del),
            Just(Intention::Util),
        ]
    }

    proptest! {
        /// Spec property 6: swapping in an already-HOT key is a no-op
        /// regardless of what the command actually asked for, since
        /// `swap_ana` never looks past residency once it is HOT.
        #[test]
        fn swap_in_on_a_hot_key_is_always_a_nop(
            cmd_intention in any_intention(),
            flag_bits in any::<u32>(),
            value_dirty in any::<bool>(),
        ) {
            let data = WholeKeyData;
            let input = SwapAnaInput {
                residency: Residency::Hot,
                cmd_intention,
                cmd_intention_flags: IntentionFlags::from_bits_truncate(flag_bits),
                value_dirty,
            };
            prop_assert_eq!(data.swap_ana(&input).0, Intention::Nop);
        }
    }
}
