//! Static vtable registry keyed by [`ObjectType`] (spec.md §9 "dispatch
//! polymorphism"), and the two registered implementations: whole-key
//! blobs and sub-key-addressable hashes.

mod hash;
mod whole_key;

use once_cell::sync::Lazy;
use std::collections::HashMap;
use swapcore_core::vtable::{ObjectType, SwapDataType};

/// Look up the vtable registered for `object_type`, if any.
///
/// Only [`ObjectType::WholeKey`] and [`ObjectType::Hash`] are registered
/// in this workspace (spec.md §4.2); the remaining `ObjectType` variants
/// exist so callers can name them but have no swap-data implementation.
pub fn registry(object_type: ObjectType) -> Option<&'static dyn SwapDataType> {
    static TABLE: Lazy<HashMap<ObjectType, Box<dyn SwapDataType>>> = Lazy::new(|| {
        let mut m: HashMap<ObjectType, Box<dyn SwapDataType>> = HashMap::new();
        m.insert(ObjectType::WholeKey, Box::new(whole_key::WholeKeyData));
        m.insert(ObjectType::Hash, Box::new(hash::HashData));
        m
    });
    TABLE.get(&object_type).map(|b| b.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_whole_key_and_hash_only() {
        assert!(registry(ObjectType::WholeKey).is_some());
        assert!(registry(ObjectType::Hash).is_some());
        assert!(registry(ObjectType::List).is_none());
    }
}
