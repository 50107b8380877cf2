//! Executor-level error type: the swap core's own errors plus the
//! handful of command-surface errors the reference command set needs.

use swapcore_core::SwapError;
use thiserror::Error;

/// Errors the reference executor can return to a caller.
#[derive(Debug, Error)]
pub enum ExecError {
    /// A lower-layer swap error.
    #[error(transparent)]
    Swap(#[from] SwapError),

    /// The command addressed a key whose stored type does not match
    /// what the command requires (e.g. `HGET` on a plain string).
    #[error("wrong type for key {0:?}")]
    WrongType(Vec<u8>),

    /// The database index named by the command does not exist.
    #[error("database index {0} out of range")]
    NoSuchDatabase(u32),

    /// The executor was asked to start with an invalid [`crate::config::SwapConfig`].
    #[error("invalid executor configuration: {0}")]
    Config(String),
}

/// Convenience alias for executor operations.
pub type ExecResult<T> = Result<T, ExecError>;
