use rusqlite::Connection;

use crate::error::StorageError;
use crate::kind::MappingKind;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection, kinds: &[&MappingKind]) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    for kind in kinds {
        conn.execute_batch(&kind.create_sql())?;
    }
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());
";
