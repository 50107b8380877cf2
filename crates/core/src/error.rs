//! Error hierarchy shared across the swap core (spec.md §7).

use thiserror::Error;

/// Errors the swap core can produce. Each variant corresponds to one of
/// the error kinds enumerated in spec.md §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwapError {
    /// Persistent bytes could not be parsed into a meta or sub-key
    /// record. The key is left COLD; surfaced to the client as a server
    /// error.
    #[error("decode error for key {key:?}: {reason}")]
    Decode {
        /// The key whose persisted bytes failed to decode.
        key: Vec<u8>,
        /// Human-readable reason, not meant to be matched on.
        reason: String,
    },

    /// The persistent engine call itself failed.
    #[error("engine I/O error: {0}")]
    Io(String),

    /// Swap-data could not be constructed, e.g. an unknown `object_type`
    /// tag was read from a meta record. Rejected before any I/O.
    #[error("no swap-data registered for object type {0:?}")]
    Setup(crate::vtable::ObjectType),

    /// One of the three scan-session error kinds (spec.md §4.9).
    #[error("scan session error: {0}")]
    ScanSession(#[from] ScanSessionError),

    /// The worker observed a RIO action that its `swapAnaAction` mapping
    /// never produces for the request's intention — an invariant
    /// violation inside the worker.
    #[error("unexpected RIO action for intention {intention:?}")]
    UnexpectedAction {
        /// The intention the action was computed from.
        intention: crate::key::Intention,
    },

    /// The worker observed an intention it has no finish-step handling
    /// for — an invariant violation.
    #[error("unexpected intention {0:?}")]
    UnexpectedIntention(crate::key::Intention),
}

/// One of `UNASSIGNED / INPROGRESS / SEQUNMATCH` (spec.md §4.9).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScanSessionError {
    /// The cursor names a session that has been returned to the free
    /// list or never existed.
    #[error("scan session unassigned")]
    Unassigned,
    /// The session is currently bound to another in-flight request.
    #[error("scan session already in progress")]
    InProgress,
    /// The caller's cursor sequence does not match the session's
    /// `next_cursor`.
    #[error("scan cursor sequence does not match")]
    SeqUnmatch,
}

/// Convenience alias used throughout the workspace.
pub type SwapResult<T> = Result<T, SwapError>;
