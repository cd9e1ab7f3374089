//! Typed queries implementing [`ChangesetStore`] for [`SqliteStore`].

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{ChangesetStore, SqliteStore};
use crate::errors::StoreError;
use crate::models::{ChangeAction, ChangedPath, Revision};

impl ChangesetStore for SqliteStore {
    fn latest(&self, repository: &str) -> Result<Option<Revision>, StoreError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT id, revision, scmid, author, committed_on, comments
                 FROM changesets
                 WHERE repository = ?1
                 ORDER BY committed_on DESC, id DESC
                 LIMIT 1",
                params![repository],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, identifier, scmid, author, committed_on, comments)) = row else {
            return Ok(None);
        };
        let committed_on = DateTime::<Utc>::from_timestamp(committed_on, 0).ok_or_else(|| {
            StoreError::InvalidRecord {
                scmid: scmid.clone(),
                detail: format!("timestamp {committed_on} out of range"),
            }
        })?;
        let paths = load_paths(&conn, id)?;
        Ok(Some(Revision {
            identifier,
            scmid,
            author,
            committed_on,
            message: comments,
            paths,
        }))
    }

    fn exists(&self, repository: &str, scmid: &str) -> Result<bool, StoreError> {
        let conn = self.conn();
        let found = conn
            .query_row(
                "SELECT 1 FROM changesets WHERE repository = ?1 AND scmid = ?2",
                params![repository, scmid],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn save(&self, repository: &str, revision: &Revision) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT INTO changesets (repository, revision, scmid, author, committed_on, comments)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                repository,
                revision.identifier,
                revision.scmid,
                revision.author,
                revision.committed_on.timestamp(),
                revision.message,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::Duplicate {
                    repository: repository.to_string(),
                    scmid: revision.scmid.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        let changeset_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO changes (changeset_id, action, path) VALUES (?1, ?2, ?3)",
            )?;
            for changed_path in &revision.paths {
                stmt.execute(params![
                    changeset_id,
                    changed_path.action.as_letter(),
                    changed_path.path,
                ])?;
            }
        }
        tx.commit()?;
        debug!(repository, scmid = %revision.scmid, paths = revision.paths.len(), "persisted changeset");
        Ok(())
    }
}

/// Changed paths of one changeset, in insertion order.
fn load_paths(conn: &Connection, changeset_id: i64) -> Result<Vec<ChangedPath>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT action, path FROM changes WHERE changeset_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![changeset_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut paths = Vec::new();
    for row in rows {
        let (action, path) = row?;
        paths.push(ChangedPath {
            action: ChangeAction::from_letter(&action),
            path,
        });
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revision(scmid: &str, secs: i64, paths: Vec<ChangedPath>) -> Revision {
        Revision {
            identifier: scmid.to_string(),
            scmid: scmid.to_string(),
            author: "Alice <alice@example.com>".into(),
            committed_on: DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
            message: format!("commit {scmid}"),
            paths,
        }
    }

    fn changed(action: ChangeAction, path: &str) -> ChangedPath {
        ChangedPath {
            action,
            path: path.into(),
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let rev = revision(
            &"a".repeat(40),
            100,
            vec![
                changed(ChangeAction::Added, "src/lib.rs"),
                changed(ChangeAction::Modified, "Cargo.toml"),
                changed(ChangeAction::Deleted, "old.rs"),
            ],
        );
        store.save("repo", &rev).unwrap();

        assert!(store.exists("repo", &rev.scmid).unwrap());
        let loaded = store.latest("repo").unwrap().unwrap();
        assert_eq!(loaded, rev);
        // Changed-path order is insertion order.
        assert_eq!(loaded.paths[0].path, "src/lib.rs");
        assert_eq!(loaded.paths[2].action, ChangeAction::Deleted);
    }

    #[test]
    fn test_duplicate_save_is_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        let rev = revision(&"a".repeat(40), 100, vec![]);
        store.save("repo", &rev).unwrap();
        let err = store.save("repo", &rev).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[test]
    fn test_latest_tracks_newest_commit_time() {
        let store = SqliteStore::in_memory().unwrap();
        store.save("repo", &revision(&"a".repeat(40), 100, vec![])).unwrap();
        store.save("repo", &revision(&"c".repeat(40), 300, vec![])).unwrap();
        store.save("repo", &revision(&"b".repeat(40), 200, vec![])).unwrap();

        let latest = store.latest("repo").unwrap().unwrap();
        assert_eq!(latest.scmid, "c".repeat(40));
    }

    #[test]
    fn test_repositories_are_isolated() {
        let store = SqliteStore::in_memory().unwrap();
        let rev = revision(&"a".repeat(40), 100, vec![]);
        store.save("one", &rev).unwrap();

        assert!(!store.exists("two", &rev.scmid).unwrap());
        assert_eq!(store.latest("two").unwrap(), None);
        // The same scm id may be persisted under a different repository.
        store.save("two", &rev).unwrap();
    }

    #[test]
    fn test_exists_on_empty_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(!store.exists("repo", "missing").unwrap());
    }
}
