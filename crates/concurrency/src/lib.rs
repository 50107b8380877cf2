//! Hierarchical server/database/key lock manager (spec.md §4.3, component
//! C7) and the swap-context glue object (component C12).
//!
//! The legacy "wait" manager (component C8) is not implemented: spec.md
//! §9 treats it as obsolete and says implementers may provide only C7.

#![warn(missing_docs)]

pub mod context;
pub mod lock;

pub use context::SwapCtx;
pub use lock::{LockId, LockManager};
