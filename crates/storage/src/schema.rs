use rusqlite::Connection;

use crate::error::StorageError;

/// Layout version recorded in the `schema_version` table.
pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, unixepoch())",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

// Entity tables share one layout: the rowid keeps insertion order stable
// across upserts, the body is a named-field MessagePack record.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS cemetery (
    key TEXT PRIMARY KEY,
    body BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS graves (
    rowid INTEGER PRIMARY KEY,
    uuid TEXT NOT NULL UNIQUE,
    body BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS landmarks (
    rowid INTEGER PRIMARY KEY,
    uuid TEXT NOT NULL UNIQUE,
    body BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS roads (
    rowid INTEGER PRIMARY KEY,
    uuid TEXT NOT NULL UNIQUE,
    body BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS grave_groups (
    rowid INTEGER PRIMARY KEY,
    uuid TEXT NOT NULL UNIQUE,
    body BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS change_log (
    rowid INTEGER PRIMARY KEY,
    uuid TEXT NOT NULL,
    op TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    body BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_change_log_uuid ON change_log (uuid);
";
