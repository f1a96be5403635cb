//! SQLite statements behind the memory store.
//!
//! This module provides:
//! - schema creation for `memories` and its FTS5 index
//! - row mapping into `MemoryRecord`
//! - `embedding`: BLOB conversion for the nullable embedding column
//! - `fts`: FTS5 index maintenance and BM25-ranked search
//! - `query`: web-search query syntax rendered to FTS5
//!
//! Every function takes a borrowed `Connection` and runs inside one pooled unit of work.

pub mod embedding;
pub mod fts;
pub mod query;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::memory_types::MemoryRecord;

/// Create the schema if it does not exist yet.
pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            created_at TEXT NOT NULL,
            embedding BLOB
        );

        CREATE INDEX IF NOT EXISTS idx_memories_created_at ON memories(created_at);

        CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
            text,
            tokenize='porter unicode61',
            content='memories',
            content_rowid='rowid'
        );

        CREATE TRIGGER IF NOT EXISTS memories_fts_insert AFTER INSERT ON memories BEGIN
            INSERT INTO memories_fts(rowid, text) VALUES (new.rowid, new.text);
        END;
        "#,
    )
}

/// Timestamps are stored as fixed-width RFC 3339 so text order is time order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

pub(crate) fn read_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e))
}

pub(crate) fn read_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, Type::Text, e))
}

fn read_embedding(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Vec<f32>>> {
    let blob: Option<Vec<u8>> = row.get(idx)?;
    blob.map(|bytes| embedding::blob_to_vec(&bytes))
        .transpose()
        .map_err(|e| conversion_error(idx, Type::Blob, e))
}

/// Insert one memory row. The embedding column is left NULL.
pub fn insert_memory(
    conn: &Connection,
    id: &Uuid,
    text: &str,
    created_at: &DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO memories (id, text, created_at, embedding)
        VALUES (?1, ?2, ?3, NULL)
        "#,
        params![id.to_string(), text, format_timestamp(created_at)],
    )?;
    Ok(())
}

/// Fetch a single memory by ID. Returns `None` when no row matches.
pub fn get_memory(conn: &Connection, id: &Uuid) -> rusqlite::Result<Option<MemoryRecord>> {
    let mut stmt = conn.prepare_cached(
        r#"
        SELECT id, text, created_at, embedding
        FROM memories
        WHERE id = ?1
        "#,
    )?;

    stmt.query_row([id.to_string()], |row| {
        Ok(MemoryRecord {
            id: read_id(row, 0)?,
            text: row.get(1)?,
            created_at: read_timestamp(row, 2)?,
            embedding: read_embedding(row, 3)?,
        })
    })
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_create_schema_is_idempotent() {
        let conn = test_conn();
        create_schema(&conn).unwrap();
    }

    #[test]
    fn test_insert_and_get() {
        let conn = test_conn();
        let id = Uuid::new_v4();
        let now = Utc::now();
        insert_memory(&conn, &id, "buy milk", &now).unwrap();

        let record = get_memory(&conn, &id).unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.text, "buy milk");
        assert_eq!(record.created_at, now);
        assert_eq!(record.embedding, None);
    }

    #[test]
    fn test_get_nonexistent() {
        let conn = test_conn();
        assert!(get_memory(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let conn = test_conn();
        let id = Uuid::new_v4();
        insert_memory(&conn, &id, "first", &Utc::now()).unwrap();
        assert!(insert_memory(&conn, &id, "second", &Utc::now()).is_err());
    }

    #[test]
    fn test_get_decodes_stored_embedding() {
        let conn = test_conn();
        let id = Uuid::new_v4();
        insert_memory(&conn, &id, "with vector", &Utc::now()).unwrap();
        conn.execute(
            "UPDATE memories SET embedding = ?1 WHERE id = ?2",
            params![embedding::vec_to_blob(&[0.5, -0.25]), id.to_string()],
        )
        .unwrap();

        let record = get_memory(&conn, &id).unwrap().unwrap();
        assert_eq!(record.embedding, Some(vec![0.5, -0.25]));
    }

    #[test]
    fn test_corrupt_timestamp_is_an_error() {
        let conn = test_conn();
        let id = Uuid::new_v4();
        conn.execute(
            "INSERT INTO memories (id, text, created_at) VALUES (?1, 'x', 'yesterday')",
            [id.to_string()],
        )
        .unwrap();
        assert!(get_memory(&conn, &id).is_err());
    }

    #[test]
    fn test_timestamps_sort_as_text() {
        let earlier = DateTime::parse_from_rfc3339("2024-01-01T00:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = DateTime::parse_from_rfc3339("2024-01-01T00:00:01Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(format_timestamp(&earlier) < format_timestamp(&later));
    }
}
