//! Key-requests: the unit the lock manager schedules and the swap-data
//! analyzer consumes.
//!
//! Grounded on spec.md §3 ("Key-request") and §4.1 (request extractor).

use crate::txid::TxId;
use bitflags::bitflags;
use std::sync::Arc;

/// The level at which a key-request locks: the whole server, one database,
/// or one key within a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Locks the entire server (e.g. FLUSHALL). Waits for every in-flight
    /// per-db / per-key operation.
    Server,
    /// Locks one database (e.g. FLUSHDB, SWAPDB).
    Database,
    /// Locks one key within a database. The common case.
    Key,
}

/// What the swap subsystem intends to do for a key-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intention {
    /// No swap I/O needed; the command can proceed against RAM state as-is.
    Nop,
    /// Bring data in from the persistent store (partially or wholly).
    In,
    /// Evict clean data out to the persistent store, freeing RAM.
    Out,
    /// Remove the key from both RAM and the persistent store.
    Del,
    /// Component-specific background operation (e.g. compaction).
    Util,
}

bitflags! {
    /// `cmd_intention_flags` from spec.md §3.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IntentionFlags: u32 {
        /// Command semantics imply the key should be deleted after use
        /// (e.g. GETDEL), folded into an IN's handling of deletion.
        const IN_DEL            = 1 << 0;
        /// The delete implied by IN_DEL only needs a mock/placeholder
        /// value, not the real fetched value (e.g. EXPIRE-driven eviction).
        const IN_DEL_MOCK_VALUE = 1 << 1;
        /// Only the meta record is needed, not the full value (e.g. TTL
        /// inspection, TYPE).
        const IN_META           = 1 << 2;
        /// A fetched value will be unconditionally overwritten by the
        /// command (e.g. SET without GET semantics) — skips merge.
        const IN_OVERWRITE      = 1 << 3;
        /// Only the meta side needs to be written out on an OUT (no dirty
        /// data to persist).
        const OUT_META          = 1 << 4;
        /// Skip issuing the physical delete RIO; the caller already knows
        /// the persistent side is absent.
        const FIN_DEL_SKIP      = 1 << 5;
        /// This key-request exists to drive a cold-capable SCAN page.
        const METASCAN_SCAN     = 1 << 6;
        /// This key-request exists to drive RANDOMKEY over cold keyspace.
        const METASCAN_RANDOMKEY = 1 << 7;
        /// This key-request exists to drive active-expire cycle scanning.
        const METASCAN_EXPIRE   = 1 << 8;
    }
}

/// Tagged union describing which sub-part of a composite value a
/// key-request addresses (spec.md §3 "shape").
#[derive(Debug, Clone)]
pub enum KeyRequestShape {
    /// The command needs the whole key (default for simple types).
    WholeKey,
    /// The command needs an explicit, ordered list of sub-keys (hash
    /// fields, set/zset members, ...).
    SubKeys(Arc<[Vec<u8>]>),
    /// The command needs elements at index positions in `[lo, hi]`
    /// inclusive (list index / range / pop / move).
    IndexRange {
        /// Inclusive lower bound.
        lo: i64,
        /// Inclusive upper bound.
        hi: i64,
    },
    /// The command needs zset members whose score falls in `[lo, hi]`.
    ScoreRange {
        /// Inclusive lower score bound.
        lo: f64,
        /// Inclusive upper score bound.
        hi: f64,
    },
    /// The command needs zset members whose lexicographic value falls in
    /// `[lo, hi]`, encoded the same way the command parsed them (so `(`
    /// / `[` exclusivity markers are preserved as raw bytes).
    LexRange {
        /// Lower bound, already carrying its inclusivity marker.
        lo: Vec<u8>,
        /// Upper bound, already carrying its inclusivity marker.
        hi: Vec<u8>,
    },
    /// A sentinel request with no specific key, used by global commands
    /// (FLUSHALL/FLUSHDB) that must drain the whole lattice below them.
    Sentinel,
}

/// One key-request: what a command needs resident in memory to execute,
/// as extracted by the request extractor (C6) and fed to the lock manager
/// (C7) and swap-data analyzer (C2).
#[derive(Debug, Clone)]
pub struct KeyRequest {
    /// Owning transaction. Shared by every key-request of one command or
    /// multi-command transaction.
    pub txid: TxId,
    /// Lock level this request locks at.
    pub level: Level,
    /// Database index; meaningless at [`Level::Server`].
    pub dbid: u32,
    /// Key name; `None` at [`Level::Server`] and [`Level::Database`].
    pub key: Option<Arc<[u8]>>,
    /// What the command wants done for this key.
    pub cmd_intention: Intention,
    /// Refinements of `cmd_intention`.
    pub cmd_intention_flags: IntentionFlags,
    /// Which part of the value this request addresses.
    pub shape: KeyRequestShape,
    /// Original `(sub_command_index, arg_index)` the extractor may need
    /// to rewrite after execution (e.g. list index canonicalization).
    /// Empty for requests with nothing rewritable.
    pub rewrite_positions: Vec<(usize, usize)>,
}

impl KeyRequest {
    /// Build a whole-key request — the common case.
    pub fn whole_key(
        txid: TxId,
        dbid: u32,
        key: impl Into<Arc<[u8]>>,
        intention: Intention,
        flags: IntentionFlags,
    ) -> Self {
        KeyRequest {
            txid,
            level: Level::Key,
            dbid,
            key: Some(key.into()),
            cmd_intention: intention,
            cmd_intention_flags: flags,
            shape: KeyRequestShape::WholeKey,
            rewrite_positions: Vec::new(),
        }
    }

    /// Build a database-level sentinel request (e.g. FLUSHDB).
    pub fn database(txid: TxId, dbid: u32, intention: Intention) -> Self {
        KeyRequest {
            txid,
            level: Level::Database,
            dbid,
            key: None,
            cmd_intention: intention,
            cmd_intention_flags: IntentionFlags::empty(),
            shape: KeyRequestShape::Sentinel,
            rewrite_positions: Vec::new(),
        }
    }

    /// Build a server-level sentinel request (e.g. FLUSHALL).
    pub fn server(txid: TxId, intention: Intention) -> Self {
        KeyRequest {
            txid,
            level: Level::Server,
            dbid: 0,
            key: None,
            cmd_intention: intention,
            cmd_intention_flags: IntentionFlags::empty(),
            shape: KeyRequestShape::Sentinel,
            rewrite_positions: Vec::new(),
        }
    }

    /// `true` if this request targets a specific key rather than a whole
    /// database or the whole server.
    pub fn is_key_level(&self) -> bool {
        matches!(self.level, Level::Key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_key_defaults() {
        let req = KeyRequest::whole_key(TxId::from_raw(1), 0, b"foo".to_vec(), Intention::In, IntentionFlags::empty());
        assert!(req.is_key_level());
        assert!(matches!(req.shape, KeyRequestShape::WholeKey));
    }

    #[test]
    fn flags_compose() {
        let f = IntentionFlags::IN_DEL | IntentionFlags::IN_META;
        assert!(f.contains(IntentionFlags::IN_DEL));
        assert!(f.contains(IntentionFlags::IN_META));
        assert!(!f.contains(IntentionFlags::OUT_META));
    }
}
