//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the SnapshotStore trait.

use crate::storage::schema::{get_schema_version, initialize_schema, SCHEMA_VERSION};
use crate::storage::traits::{SnapshotStore, StorageError, StorageResult};
use crate::storage::SnapshotRecord;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;

/// SQLite snapshot backend
pub struct SqliteSnapshot {
    conn: Connection,
}

impl SqliteSnapshot {
    /// Opens (or creates) a snapshot database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Snapshot files are renamed over each other, so keep the journal inline
        conn.execute_batch(
            "
            PRAGMA journal_mode = DELETE;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        let found = get_schema_version(&conn)?;
        if found > SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchema {
                path: path.to_path_buf(),
                found,
            });
        }

        let migrated = initialize_schema(&conn)?;
        if migrated > 0 {
            tracing::warn!(
                "Converted {} rows of an unversioned snapshot in {}",
                migrated,
                path.display()
            );
        }

        Ok(Self { conn })
    }

    /// Creates an in-memory snapshot (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Gets the record for a relative path
    #[cfg(test)]
    pub fn get(&self, relative_path: &str) -> StorageResult<Option<SnapshotRecord>> {
        use rusqlite::OptionalExtension;

        let record = self
            .conn
            .query_row(
                "SELECT filename, timestamp, filesize FROM files WHERE filename = ?1",
                params![relative_path],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Returns all records ordered by path
    #[cfg(test)]
    pub fn records(&self) -> StorageResult<Vec<SnapshotRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT filename, timestamp, filesize FROM files ORDER BY filename")?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Closes the connection, flushing everything to disk
    pub fn close(self) -> StorageResult<()> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }
}

#[cfg(test)]
fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SnapshotRecord> {
    let size: i64 = row.get(2)?;
    Ok(SnapshotRecord {
        relative_path: row.get(0)?,
        modified_at: row.get(1)?,
        size_bytes: size.max(0) as u64,
    })
}

const UPSERT_SQL: &str =
    "INSERT OR REPLACE INTO files (filename, timestamp, filesize) VALUES (?1, ?2, ?3)";

impl SnapshotStore for SqliteSnapshot {
    fn upsert_many(&mut self, records: &[SnapshotRecord]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_SQL)?;
            for record in records {
                stmt.execute(params![
                    record.relative_path,
                    record.modified_at,
                    record.size_bytes as i64
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    fn paths(&self) -> StorageResult<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT filename FROM files")?;
        let paths = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(paths)
    }

    fn count(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(DISTINCT filename) FROM files", [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

}
