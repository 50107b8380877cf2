//! RAM-resident value representation.
//!
//! The spec only requires the whole-key type and one sub-key-addressable
//! type to be functional (spec.md §4.2); [`SwapValue`] carries exactly
//! those two shapes. A WARM value's `Hash` variant holds whatever subset
//! of fields is currently resident — which fields are missing is a
//! function of the command's [`crate::key::KeyRequestShape`], not of the
//! value itself.

use rustc_hash::FxHashMap;

/// A value as it lives in the RAM dictionary.
#[derive(Debug, Clone, PartialEq)]
pub enum SwapValue {
    /// A single opaque blob — strings and small aggregates stored
    /// whole.
    WholeKey(Vec<u8>),
    /// A field-addressable aggregate (hash). May hold only a subset of
    /// its persisted fields when the key is WARM.
    Hash(FxHashMap<Vec<u8>, Vec<u8>>),
}

impl SwapValue {
    /// Borrow as a whole-key blob, if that's what this value is.
    pub fn as_whole_key(&self) -> Option<&[u8]> {
        match self {
            SwapValue::WholeKey(b) => Some(b),
            _ => None,
        }
    }

    /// Borrow as a hash, if that's what this value is.
    pub fn as_hash(&self) -> Option<&FxHashMap<Vec<u8>, Vec<u8>>> {
        match self {
            SwapValue::Hash(h) => Some(h),
            _ => None,
        }
    }

    /// Mutably borrow as a hash, if that's what this value is.
    pub fn as_hash_mut(&mut self) -> Option<&mut FxHashMap<Vec<u8>, Vec<u8>>> {
        match self {
            SwapValue::Hash(h) => Some(h),
            _ => None,
        }
    }
}
