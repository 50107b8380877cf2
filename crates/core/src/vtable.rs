//! The per-value-type strategy interface (spec.md §4.2).
//!
//! Dispatch polymorphism follows the teacher's convention of a trait
//! object per type, registered in a static table keyed by [`ObjectType`]
//! (spec.md §9 "Dispatch polymorphism"). The trait here only covers the
//! decision/merge logic that is genuinely type-specific; physical
//! raw-key encoding (dbid prefix, version stuffing) is type-agnostic and
//! lives in `swapcore-storage` instead, so this crate never needs to
//! depend on the storage layer.

use crate::error::SwapResult;
use crate::key::{Intention, IntentionFlags, KeyRequestShape};
use crate::residency::Residency;
use crate::value::SwapValue;

/// Discriminates which vtable decodes/encodes a key's data.
///
/// Only [`ObjectType::WholeKey`] and [`ObjectType::Hash`] have a
/// registered vtable in this workspace (spec.md §4.2: "the spec only
/// requires the whole-key and one sub-key-addressable type to be
/// functional"). The remaining variants are kept so that [`MetaRecord`]
/// and the command extractor can name them; they are parallel
/// instantiations left for a follow-up, matching the original's
/// `list`/`set`/`zset`/`stream` swap-data modules.
///
/// [`MetaRecord`]: crate::meta::MetaRecord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// A single opaque blob.
    WholeKey,
    /// A field-addressable hash.
    Hash,
    /// Not implemented; reserved tag.
    List,
    /// Not implemented; reserved tag.
    Set,
    /// Not implemented; reserved tag.
    ZSet,
    /// Not implemented; reserved tag.
    Stream,
}

/// One physical operation against the persistent engine (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RioAction {
    /// No I/O needed.
    Nop,
    /// Single-key fetch.
    Get,
    /// Single-key write.
    Put,
    /// Single-key delete.
    Del,
    /// Multi-key fetch (meta + N sub-keys, or N whole keys).
    MultiGet,
    /// An atomic batch of puts/deletes.
    Write,
    /// A range scan over a column family.
    Iterate,
}

/// Which column family a raw key/value lives in (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnFamily {
    /// Per-key header: object-type, expire, version, extension.
    Meta,
    /// Value or sub-key entries.
    Data,
}

/// Inputs to [`SwapDataType::swap_ana`] — the full state `swapAna` needs
/// to compute an intention (spec.md §4.2 decision table).
#[derive(Debug, Clone, Copy)]
pub struct SwapAnaInput {
    /// Current residency of the key before this command runs.
    pub residency: Residency,
    /// What the command wants.
    pub cmd_intention: Intention,
    /// Refinements of `cmd_intention`.
    pub cmd_intention_flags: IntentionFlags,
    /// `true` if the RAM value has been mutated since it was last clean
    /// (i.e. an OUT must persist it rather than just drop it).
    pub value_dirty: bool,
}

/// What sub-part of a value is missing and must be fetched, as decided
/// by [`SwapDataType::missing_subkeys`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingSubkeys {
    /// Nothing is missing; the resident value already satisfies the
    /// request.
    None,
    /// The entire value is missing (key is COLD, or the type has no
    /// sub-key granularity).
    All,
    /// Exactly these sub-keys are missing from an otherwise-WARM value.
    Explicit(Vec<Vec<u8>>),
}

/// The per-value-type strategy. One instance exists per [`ObjectType`]
/// and is looked up through a static registry (see
/// `swapcore-engine::vtable::registry`).
pub trait SwapDataType: Send + Sync {
    /// Which type this vtable implements.
    fn object_type(&self) -> ObjectType;

    /// Decide the swap intention for this key-request given its current
    /// residency (spec.md §4.2 decision table). This is the Rust
    /// equivalent of `swapAna`.
    fn swap_ana(&self, input: &SwapAnaInput) -> (Intention, IntentionFlags);

    /// Map a decided intention to the RIO action that realizes it, given
    /// which part of the value `shape` addresses. This is the Rust
    /// equivalent of `swapAnaAction(data, intention, datactx)`; `shape`
    /// stands in for the parts of `datactx` the decision needs (e.g. an
    /// explicit sub-key list fetches narrower than a whole-value
    /// request).
    fn swap_ana_action(&self, intention: Intention, shape: &KeyRequestShape) -> RioAction;

    /// Determine which sub-keys (if any) are missing from `existing`
    /// relative to what `shape` needs.
    fn missing_subkeys(
        &self,
        existing: Option<&SwapValue>,
        shape: &KeyRequestShape,
    ) -> MissingSubkeys;

    /// Decode raw `(subkey, value)` pairs fetched from the `DATA` column
    /// family into a value fragment. This is the Rust equivalent of
    /// `decodeData`.
    fn decode_fragment(&self, raw_pairs: &[(Vec<u8>, Vec<u8>)]) -> SwapResult<SwapValue>;

    /// Merge a freshly decoded fragment into an existing (possibly
    /// partial) RAM value, or create one if `existing` is `None`. This is
    /// the Rust equivalent of `createOrMergeObject`.
    fn merge(&self, existing: Option<SwapValue>, fragment: SwapValue) -> SwapValue;

    /// `true` if, after merging, the RAM value now holds everything the
    /// request's shape needs — i.e. the key can be treated as HOT for the
    /// purposes of this command. Equivalent to `mergedIsHot`.
    fn merged_is_hot(&self, value: &SwapValue, shape: &KeyRequestShape) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rio_action_variants_distinct() {
        assert_ne!(RioAction::Get, RioAction::Put);
        assert_ne!(RioAction::MultiGet, RioAction::Iterate);
    }
}
