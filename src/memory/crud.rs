//! Insert and lookup operations for the memory store.

use chrono::Utc;
use uuid::Uuid;

use crate::errors::{Error, Operation};
use crate::memory_types::MemoryRecord;
use crate::sqlite;

use super::store::MemoryStore;

impl MemoryStore {
    #[must_use = "handle the error or results may be lost"]
    /// Store a new memory and return its freshly generated ID.
    ///
    /// The ID is a random v4 UUID and `created_at` is the current UTC time,
    /// both fixed at this call. The embedding column stays NULL.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Input is empty or whitespace-only
    /// - Input exceeds 100,000 bytes
    /// - The pool is not initialized or exhausted
    /// - The insert fails (`Error::Statement` with `Operation::Add`) or times out
    pub async fn add(&self, text: &str) -> Result<Uuid, Error> {
        Self::validate_input_length(text)?;

        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let text = text.to_owned();

        let conn = self.pool.acquire().await?;
        conn.run(Operation::Add, move |conn| {
            sqlite::insert_memory(conn, &id, &text, &created_at)
        })
        .await?;

        tracing::debug!(%id, "memory added");
        Ok(id)
    }

    #[must_use = "handle the error or results may be lost"]
    /// Get a specific memory by ID.
    ///
    /// Returns `None` if the memory doesn't exist; that is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the pool is unavailable or the lookup statement fails
    /// (`Error::Statement` with `Operation::Lookup`).
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<MemoryRecord>, Error> {
        let conn = self.pool.acquire().await?;
        conn.run(Operation::Lookup, move |conn| sqlite::get_memory(conn, &id))
            .await
    }
}
