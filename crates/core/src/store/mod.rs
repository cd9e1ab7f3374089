//! Changeset persistence for GitMirror.
//!
//! [`ChangesetStore`] is the contract the sync engine consumes: look up the
//! newest known revision, test existence by scm id, and persist a revision
//! if its id is absent. [`SqliteStore`] implements it over SQLite with
//! WAL-mode journaling and idempotent schema setup.

pub mod queries;
pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::StoreError;
use crate::models::Revision;

/// The external store contract consumed by the sync engine.
///
/// `save` must be insert-if-absent: persisting a revision whose scm id is
/// already present for the repository yields [`StoreError::Duplicate`].
/// That duplicate detection is the only mechanism making racing sync runs
/// against the same store safe; no locking happens above it.
pub trait ChangesetStore {
    /// Newest known revision for the repository, or `None` when empty.
    fn latest(&self, repository: &str) -> Result<Option<Revision>, StoreError>;

    /// Whether a revision with this scm id is already persisted.
    fn exists(&self, repository: &str, scmid: &str) -> Result<bool, StoreError>;

    /// Persist one revision, including its ordered changed paths.
    fn save(&self, repository: &str, revision: &Revision) -> Result<(), StoreError>;
}

/// SQLite-backed changeset store.
///
/// The inner connection is wrapped in a `Mutex` so the store is
/// `Send + Sync` and usable behind an `Arc`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store database at `path` and bring the schema
    /// up to date.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening changeset store");

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        schema::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Obtain a lock on the underlying connection.
    ///
    /// If the mutex is poisoned (a previous holder panicked), the lock is
    /// recovered rather than propagating the panic.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            debug!("store mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
