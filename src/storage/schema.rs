//! Database schema definitions
//!
//! Both snapshot files (baseline and observed) share this single-table schema.

use crate::url::local_relative_path;
use rusqlite::{params, Connection};

/// SQL schema for a snapshot database
pub const SCHEMA_SQL: &str = r#"
-- One row per mirrored file, keyed by its path relative to the media root
CREATE TABLE IF NOT EXISTS files (
    filename TEXT PRIMARY KEY,
    timestamp INTEGER NOT NULL,
    filesize INTEGER NOT NULL
);
"#;

/// Current schema version, stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: u32 = 1;

/// Initializes the database schema
///
/// A file with `user_version = 0` and an existing `files` table was written
/// by an older mirror that keyed rows by remote path (`/movies/a.mkv`) in a
/// table without a primary key. Its rows are rewritten to snapshot keys so
/// they compare equal to what a pass observes.
///
/// Returns the number of legacy rows carried over.
pub fn initialize_schema(conn: &Connection) -> Result<usize, rusqlite::Error> {
    let version = get_schema_version(conn)?;
    let tx = conn.unchecked_transaction()?;

    let migrated = if version == 0 && files_table_exists(&tx)? {
        migrate_legacy_table(&tx)?
    } else {
        tx.execute_batch(SCHEMA_SQL)?;
        0
    };

    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(migrated)
}

/// Reads the schema version recorded in the database
pub fn get_schema_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

fn files_table_exists(conn: &Connection) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'files'",
        [],
        |row| row.get::<_, i64>(0),
    )
    .map(|count| count > 0)
}

fn migrate_legacy_table(conn: &Connection) -> Result<usize, rusqlite::Error> {
    conn.execute_batch("ALTER TABLE files RENAME TO legacy_files;")?;
    conn.execute_batch(SCHEMA_SQL)?;

    let rows: Vec<(String, i64, i64)> = {
        let mut stmt = conn.prepare(
            "SELECT filename, CAST(COALESCE(timestamp, 0) AS INTEGER),
                    CAST(COALESCE(filesize, 0) AS INTEGER)
             FROM legacy_files WHERE filename IS NOT NULL",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    {
        let mut insert = conn.prepare(
            "INSERT OR REPLACE INTO files (filename, timestamp, filesize) VALUES (?1, ?2, ?3)",
        )?;
        for (filename, timestamp, filesize) in &rows {
            let key = local_relative_path(filename);
            if key.is_empty() {
                continue;
            }
            insert.execute(params![key, timestamp, filesize])?;
        }
    }

    conn.execute_batch("DROP TABLE legacy_files;")?;
    Ok(rows.len())
}
