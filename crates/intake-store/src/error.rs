//! Error types for the persistence boundary

use crate::path::{PathError, StorePath};

/// Errors from [`Store`](crate::Store) operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Malformed path
    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    /// Writes to the root node are not allowed
    #[error("cannot write to the store root")]
    RootWrite,

    /// Two entries of one batch overlap; the batch would be order-dependent
    #[error("overlapping paths in one update: {first} and {second}")]
    OverlappingPaths { first: StorePath, second: StorePath },

    /// A path descends through a scalar value
    #[error("cannot write below non-object value at {0}")]
    NotAnObject(StorePath),

    /// Remote unreachable or timed out
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Remote refused the write (rules, quota)
    #[error("write rejected: {0}")]
    Rejected(String),

    /// Value could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether trying the same operation again may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
