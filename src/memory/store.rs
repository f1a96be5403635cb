//! Core memory store struct bound to a connection pool.

use crate::errors::{Error, Operation};
use crate::pool::ConnectionPool;
use crate::sqlite;
use uuid::Uuid;

/// Maximum allowed input length (100,000 bytes).
pub const MAX_INPUT_LENGTH: usize = 100_000;
/// Maximum number of results a single search returns.
pub const MAX_SEARCH_LIMIT: usize = 10_000;
/// Result count used when the caller does not ask for one.
pub const DEFAULT_TOP_K: usize = 5;

/// The only component that issues statements against the `memories` table.
///
/// Holds no cache and no session state: every call checks a connection out
/// of the pool for exactly one statement and returns it before completing.
/// Cloning is cheap and clones share the same pool.
#[derive(Clone)]
pub struct MemoryStore {
    pub(crate) pool: ConnectionPool,
}

impl MemoryStore {
    /// Bind a store to a pool. The pool may still be uninitialized; operations
    /// fail with `Error::NotInitialized` until it is ready.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// The pool this store draws connections from.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Create tables, the full-text index and its trigger if missing, and
    /// rebuild the index when it disagrees with the table.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotInitialized` before the pool is ready, or a schema
    /// statement failure.
    pub async fn ensure_schema(&self) -> Result<(), Error> {
        let conn = self.pool.acquire().await?;
        let rebuilt = conn
            .run(Operation::Schema, |conn| {
                sqlite::create_schema(conn)?;
                sqlite::fts::sync_fts_index(conn)
            })
            .await?;
        tracing::debug!(rebuilt, "schema ready");
        Ok(())
    }

    /// Validate input length (rejects empty and whitespace-only inputs).
    pub(crate) fn validate_input_length(text: &str) -> Result<(), Error> {
        if text.trim().is_empty() {
            return Err(Error::EmptyInput);
        }
        if text.len() > MAX_INPUT_LENGTH {
            return Err(Error::InputTooLong {
                max_length: MAX_INPUT_LENGTH,
                actual_length: text.len(),
            });
        }
        Ok(())
    }
}

/// Clamp a requested result count to `MAX_SEARCH_LIMIT`.
pub(crate) fn clamp_limit(top_k: usize) -> usize {
    top_k.min(MAX_SEARCH_LIMIT)
}

/// Convert a signed result count from an outer interface.
///
/// # Errors
///
/// Returns `Error::InvalidLimit` for negative values.
pub fn limit_from_i64(top_k: i64) -> Result<usize, Error> {
    usize::try_from(top_k)
        .map_err(|_| Error::InvalidLimit(format!("top_k must not be negative, got {top_k}")))
}

/// Parse a memory ID received as text.
///
/// # Errors
///
/// Returns `Error::InvalidId` if `id` is not a UUID.
pub fn parse_id(id: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(id.trim()).map_err(|_| Error::InvalidId(id.to_string()))
}
