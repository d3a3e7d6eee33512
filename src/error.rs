//! Error types for the persistence side channel.
//!
//! In-memory store operations never fail. Everything that can go wrong lives
//! here: resolving storage, encoding the envelope, storage I/O, migrating
//! and merging persisted state.

use thiserror::Error;

/// Errors raised while persisting or hydrating a store.
///
/// Payloads are plain strings so the error can be cloned and handed to
/// several observers (post-hydration callbacks, logs, `flush` callers).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    /// The storage provider failed or produced no storage handle.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A storage backend rejected a read, write or removal.
    #[error("storage error: {0}")]
    Storage(String),

    /// The envelope could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The stored value could not be decoded.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A migration function failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// Merging persisted state into the live state failed.
    #[error("merge error: {0}")]
    Merge(String),

    /// Filesystem error from a file-backed storage.
    #[error("I/O error: {0}")]
    Io(String),

    /// A detached task could not be handed to the executor.
    #[error("spawn error: {0}")]
    Spawn(String),
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistError>;

impl PersistError {
    /// Build a migration error from any displayable cause.
    pub fn migration(cause: impl std::fmt::Display) -> Self {
        PersistError::Migration(cause.to_string())
    }

    /// Build a storage error from any displayable cause.
    pub fn storage(cause: impl std::fmt::Display) -> Self {
        PersistError::Storage(cause.to_string())
    }

    /// Check if this error came from the storage backend itself.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            PersistError::Storage(_) | PersistError::StorageUnavailable(_) | PersistError::Io(_)
        )
    }
}

impl From<std::io::Error> for PersistError {
    fn from(err: std::io::Error) -> Self {
        PersistError::Io(err.to_string())
    }
}
