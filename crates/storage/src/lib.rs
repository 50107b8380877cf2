//! RIO / RIO-Batch: the bit-level interface to the persistent KV engine
//! (spec.md §4.2 component C1).
//!
//! This crate owns the abstract persistent-engine vocabulary (GET / PUT /
//! DEL / MULTIGET / WRITE / ITERATE, spec.md §6), the raw-key encoding for
//! the `META` and `DATA` column families (dbid prefix, parent-version
//! stuffing for sub-keys, spec.md §4.2 "Versioning"), and a default
//! in-process backing implementation used by tests and the reference
//! executor. A real deployment swaps [`InMemoryEngine`] for a RocksDB (or
//! similar LSM) binding behind the same [`PersistentEngine`] trait.

#![warn(missing_docs)]

pub mod encode;
pub mod engine;
pub mod error;
pub mod memory;
pub mod rio;

pub use encode::{data_key, data_key_prefix_range, decode_meta, encode_meta, meta_key, parse_data_key};
pub use engine::{PersistentEngine, WriteBatch, WriteOp};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryEngine;
pub use rio::{Rio, RioBatch, RioResult};

pub use swapcore_core::vtable::ColumnFamily;
