//! Error types for intake sessions
//!
//! Nothing here is fatal to the process. A failed save leaves the in-memory
//! draft untouched; the worst case is a delayed write.

use intake_record::RecordId;
use intake_store::{PathError, StoreError};

/// Errors from session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Input for a field the registry does not know
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Persistence failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Opened a record id with nothing stored under it
    #[error("guest record not found: {0}")]
    RecordNotFound(RecordId),

    /// Opened an intake-queue entry that does not exist
    #[error("intake queue entry not found: {0}")]
    QueueEntryNotFound(String),

    /// A record id or queue key is not a valid path segment
    #[error("invalid key: {0}")]
    InvalidKey(#[from] PathError),

    /// Draft could not be serialized for writing
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Session configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session worker has stopped
    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// Whether repeating the operation may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A debounce delay was zero
    #[error("{0} must be greater than zero")]
    ZeroDelay(&'static str),

    /// A channel capacity was zero
    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),

    /// A root path is malformed or the store root itself
    #[error("invalid {key}: '{value}'")]
    InvalidRoot {
        /// Config key
        key: &'static str,
        /// Offending value
        value: String,
    },
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
