//! DUALLOG - Custom Error Types
//! Defines the error hierarchy for the dual ordered log and its store.

use thiserror::Error;

/// Custom Result type for duallog.
pub type Result<T> = std::result::Result<T, DualLogError>;

/// Error types for the dual log, the coalesce index and the backing store.
///
/// Consistency warnings (a removal touching zero or several entries, a live
/// count that drifted) are not errors; see `bench::ConsistencyWarning`.
#[derive(Error, Debug)]
pub enum DualLogError {
    /// A call to the backing store failed. Fatal for the run.
    #[error("Store communication error: {0}")]
    Store(String),

    /// A key holds a value of a different type than the operation expects.
    #[error("Operation against a key holding the wrong kind of value: {0}")]
    WrongType(String),

    /// Removal was asked for an identifier the index does not know.
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// A payload equal to a live entry was added to the same log. The store
    /// keeps one copy per member, so the earlier item moved to the new score.
    #[error("Duplicate payload in {log} while inserting {identifier}")]
    DuplicatePayload { identifier: String, log: String },

    /// An index entry does not decode to `<log-name>:<score>`.
    #[error("Malformed placement descriptor: {0}")]
    MalformedPlacement(String),

    /// A concurrent insert worker panicked.
    #[error("Insert worker panicked")]
    WorkerPanicked,

    /// I/O errors from snapshot files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Snapshot corruption detected (CRC mismatch, bad magic).
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for DualLogError {
    fn from(e: bincode::Error) -> Self {
        DualLogError::Serialization(e.to_string())
    }
}
