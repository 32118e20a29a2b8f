use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The targeted conversation, message or channel does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed request (bad channel name, empty edit, wrong conversation kind).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The requester lacks the role the operation needs.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The operation is well-formed but not allowed on this target.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A persisted collection could not be parsed. Loaders recover from
    /// this by treating the collection as empty.
    #[error("Collection {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    /// Encoding a collection failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
