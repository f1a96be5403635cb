//! FTS5 full-text search and BM25 ranking.

use rusqlite::{params, Connection};

use super::{read_id, read_timestamp};
use crate::memory_types::MemorySearchResult;

/// Rebuild the FTS5 index when it is out of step with `memories`.
///
/// Happens when the index is created over a table that already has rows.
/// Returns true when a rebuild ran.
pub fn sync_fts_index(conn: &Connection) -> rusqlite::Result<bool> {
    let memory_count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
    // The docsize shadow table holds one row per indexed document.
    let indexed_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM memories_fts_docsize", [], |row| row.get(0))?;

    if memory_count == indexed_count {
        return Ok(false);
    }

    tracing::info!(memory_count, indexed_count, "rebuilding full-text index");
    conn.execute("INSERT INTO memories_fts(memories_fts) VALUES('rebuild')", [])?;
    Ok(true)
}

fn is_fts_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.starts_with("fts5:"),
        _ => false,
    }
}

/// Run a BM25-ranked search for an already rendered FTS5 MATCH expression.
///
/// Scores are `-bm25(...)`, so every match is positive and higher is better.
/// Equal scores fall back to newest first, then id, which keeps the order
/// stable for a fixed snapshot. An expression FTS5 rejects yields no rows.
pub fn search_fts(
    conn: &Connection,
    match_expr: &str,
    limit: usize,
) -> rusqlite::Result<Vec<MemorySearchResult>> {
    let sql = r#"
        SELECT m.id, m.text, m.created_at, -bm25(memories_fts) AS score
        FROM memories_fts
        JOIN memories m ON m.rowid = memories_fts.rowid
        WHERE memories_fts MATCH ?1
        ORDER BY score DESC, m.created_at DESC, m.id ASC
        LIMIT ?2
    "#;

    let result = (|| {
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![match_expr, limit as i64], |row| {
            Ok(MemorySearchResult {
                id: read_id(row, 0)?,
                text: row.get(1)?,
                created_at: read_timestamp(row, 2)?,
                score: row.get(3)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
    })();

    match result {
        Err(err) if is_fts_syntax_error(&err) => {
            tracing::debug!(match_expr, error = %err, "unparseable full-text query, no matches");
            Ok(Vec::new())
        }
        other => other,
    }
}
