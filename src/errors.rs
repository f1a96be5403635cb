//! Error types for memoria.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The unit of work a statement belonged to when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Lookup,
    Search,
    Schema,
    HealthCheck,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Add => "add",
            Operation::Lookup => "lookup",
            Operation::Search => "search",
            Operation::Schema => "schema setup",
            Operation::HealthCheck => "health check",
        };
        f.write_str(name)
    }
}

/// Main error type for memoria operations.
#[derive(Error, Debug)]
pub enum Error {
    /// `initialize` called on a pool that is already ready.
    #[error("Connection pool already initialized")]
    AlreadyInitialized,

    /// Pool used before `initialize` or after `close`.
    #[error("Connection pool not initialized")]
    NotInitialized,

    /// Opening a database connection failed.
    #[error("Connection to {target} failed: {source}")]
    ConnectionFailed {
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Every connection stayed checked out for the whole acquire timeout.
    #[error("Connection pool exhausted: no connection available after {waited:?}")]
    PoolExhausted { waited: Duration },

    /// A statement ran longer than the statement timeout and was interrupted.
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: Operation, after: Duration },

    /// A statement failed while executing.
    #[error("{operation} failed: {source}")]
    Statement {
        operation: Operation,
        #[source]
        source: rusqlite::Error,
    },

    /// The blocking task running a statement panicked or was cancelled.
    #[error("Database task failed: {0}")]
    TaskFailed(String),

    /// Resource not found.
    #[error("Memory not found: {0}")]
    NotFound(String),

    /// Empty or whitespace-only input.
    #[error("Input cannot be empty")]
    EmptyInput,

    /// Input exceeds the maximum accepted length.
    #[error("Input too long: {actual_length} bytes (max {max_length})")]
    InputTooLong {
        max_length: usize,
        actual_length: usize,
    },

    /// Invalid search limit.
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    /// Identifier that is not a valid UUID.
    #[error("Invalid memory id: {0}")]
    InvalidId(String),

    /// Stored embedding bytes that cannot be decoded.
    #[error("Invalid embedding: {0}")]
    InvalidEmbedding(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn statement(operation: Operation, source: rusqlite::Error) -> Self {
        Error::Statement { operation, source }
    }

    /// Pool lifecycle misuse. These are programming errors and must not be retried.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Error::AlreadyInitialized | Error::NotInitialized)
    }

    /// Connectivity failures a caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::ConnectionFailed { .. } | Error::PoolExhausted { .. } | Error::Timeout { .. } => {
                true
            }
            Error::Statement { source, .. } => matches!(
                source.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }

    /// The operation a statement-level failure belongs to, if any.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Error::Statement { operation, .. } | Error::Timeout { operation, .. } => {
                Some(*operation)
            }
            _ => None,
        }
    }
}
