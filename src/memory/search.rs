//! Full-text search and health probe for the memory store.

use crate::errors::{Error, Operation};
use crate::memory_types::{DatabaseHealth, HealthReport, MemorySearchResult};
use crate::sqlite;
use crate::sqlite::query::to_fts_match;

use super::store::{clamp_limit, MemoryStore};

impl MemoryStore {
    #[must_use = "handle the error or results may be lost"]
    /// Search memories by full-text relevance.
    ///
    /// The query uses web-search syntax (bare words are AND-ed, `"phrases"`,
    /// `or`, `-exclusions`). Matches are ranked by BM25 and returned highest
    /// score first, at most `top_k` of them.
    ///
    /// # Arguments
    ///
    /// * `query` - Search query text (1 to 100,000 bytes)
    /// * `top_k` - Maximum number of results; 0 returns nothing, values above
    ///   `MAX_SEARCH_LIMIT` are clamped
    ///
    /// # Returns
    ///
    /// Results sorted by descending score. A query with nothing to match
    /// returns an empty vector rather than an error.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Query is empty or exceeds 100,000 bytes
    /// - The pool is not initialized or exhausted
    /// - The search statement fails (`Error::Statement` with `Operation::Search`) or times out
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<MemorySearchResult>, Error> {
        let query = query.trim();
        Self::validate_input_length(query)?;

        // Short-circuits below must not hide a pool that is not ready.
        self.pool.ensure_ready().await?;

        let limit = clamp_limit(top_k);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let Some(match_expr) = to_fts_match(query) else {
            tracing::debug!(query, "query has no searchable terms");
            return Ok(Vec::new());
        };

        let conn = self.pool.acquire().await?;
        conn.run(Operation::Search, move |conn| {
            sqlite::fts::search_fts(conn, &match_expr, limit)
        })
        .await
    }

    /// Liveness/readiness probe: one connection, one `SELECT 1`.
    ///
    /// Never fails; any pool or statement error is reported as `Degraded`.
    pub async fn health(&self) -> HealthReport {
        let database = match self.pool.ping().await {
            Ok(()) => DatabaseHealth::Healthy,
            Err(e) => {
                tracing::warn!(error = %e, "database health check failed");
                DatabaseHealth::Degraded
            }
        };
        HealthReport {
            status: "ok".to_string(),
            database,
        }
    }
}
