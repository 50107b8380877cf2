//! Storage-layer error type.

use thiserror::Error;

/// Errors a [`crate::engine::PersistentEngine`] implementation can
/// surface. Corresponds to the `IOError` kind in spec.md §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The underlying engine call failed.
    #[error("persistent engine I/O error: {0}")]
    Io(String),

    /// A write batch referenced a column family / operation combination
    /// the backing engine does not support.
    #[error("unsupported write batch operation: {0}")]
    Unsupported(String),
}

/// Convenience alias for this crate's fallible operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for swapcore_core::SwapError {
    fn from(e: StorageError) -> Self {
        swapcore_core::SwapError::Io(e.to_string())
    }
}
