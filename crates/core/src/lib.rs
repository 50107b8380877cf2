//! Shared types for the swap core.
//!
//! This crate defines the vocabulary every other swap-core crate builds on:
//! - [`TxId`]: monotonically increasing transaction identifier
//! - [`KeyRequest`]: the unit the lock manager schedules
//! - [`Residency`]: HOT / WARM / COLD / MISSING state of a key
//! - [`MetaRecord`]: the persistent header for a cold or partially-cold key
//! - [`SwapDataType`]: the per-value-type vtable (encode/decode/merge/swap)
//! - [`SwapError`]: the error hierarchy shared across the workspace

#![warn(missing_docs)]

pub mod error;
pub mod key;
pub mod meta;
pub mod residency;
pub mod txid;
pub mod value;
pub mod vtable;

pub use error::{ScanSessionError, SwapError, SwapResult};
pub use key::{Intention, IntentionFlags, KeyRequest, KeyRequestShape, Level};
pub use meta::{MetaExtension, MetaRecord};
pub use residency::Residency;
pub use txid::{TxId, TxIdAllocator};
pub use value::SwapValue;
pub use vtable::{ColumnFamily, MissingSubkeys, ObjectType, RioAction, SwapAnaInput, SwapDataType};
