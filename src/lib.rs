//! # swapcore
//!
//! Hybrid RAM/disk key-value swap core: a hierarchical lock manager, a
//! background I/O worker pool, and a per-value-type swap-data analyzer
//! behind a single-threaded command executor whose keyspace can be
//! partially cold.
//!
//! ```no_run
//! use std::sync::Arc;
//! use swapcore::{Command, Executor, SwapConfig};
//! use swapcore::storage::InMemoryEngine;
//!
//! fn main() -> swapcore::ExecResult<()> {
//!     let engine = Arc::new(InMemoryEngine::new());
//!     let mut executor = Executor::new(0, engine, SwapConfig::strict())?;
//!     executor.execute(Command::Set { key: b"k".to_vec(), value: b"v".to_vec() })?;
//!     executor.execute(Command::Get { key: b"k".to_vec() })?;
//!     Ok(())
//! }
//! ```
//!
//! Internal crates (`core`, `storage`, `concurrency`, `engine`) back this
//! one; only the executor's command surface re-exported here is the
//! stable entry point. `storage` is re-exported as a module so callers
//! can plug in their own [`storage::PersistentEngine`] implementation.

pub use swapcore_executor::*;

/// The abstract persistent-engine vocabulary, for callers supplying their
/// own backing store.
pub mod storage {
    pub use swapcore_storage::*;
}
