//! Schema migrations for the changeset store.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::StoreError;

const SCHEMA_VERSION: u32 = 1;

const V1: &str = r#"
CREATE TABLE IF NOT EXISTS changesets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository TEXT NOT NULL,
    revision TEXT NOT NULL,
    scmid TEXT NOT NULL,
    author TEXT NOT NULL,
    committed_on INTEGER NOT NULL,
    comments TEXT NOT NULL,
    UNIQUE (repository, scmid)
);

CREATE TABLE IF NOT EXISTS changes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    changeset_id INTEGER NOT NULL REFERENCES changesets(id) ON DELETE CASCADE,
    action TEXT NOT NULL,
    path TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_changesets_repo_committed
    ON changesets (repository, committed_on);

CREATE INDEX IF NOT EXISTS idx_changes_changeset
    ON changes (changeset_id);
"#;

/// Bring the database schema up to date.
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version < 1 {
        info!("applying changeset store schema v1");
        conn.execute_batch(V1)?;
    }
    if version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    debug!(version = SCHEMA_VERSION, "store schema is up to date");
    Ok(())
}
