//! Incremental history import engine.
//!
//! The [`SyncEngine`] compares the store's newest known revision against the
//! repository tip and imports only the unseen range:
//!
//! 1. Read the newest persisted revision for the repository.
//! 2. Read the repository tip via [`GitAdapter::info`].
//! 3. Empty store: bulk-import every non-merge commit across all branches,
//!    oldest-first; a commit that fails to persist is logged and skipped.
//! 4. Otherwise: no-op when the tip is already persisted, else fetch the
//!    range strictly newer than the stored watermark, oldest-first, and
//!    persist in order.
//!
//! Persistence is append-only and ordered; existence is checked by scm id
//! before every save, so running the engine twice with no new upstream
//! commits is a no-op on the second run. Racing sync attempts are resolved
//! by the store's duplicate detection, not by locks.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{StoreError, SyncError};
use crate::git::adapter::{GitAdapter, RevisionsOptions};
use crate::models::Revision;
use crate::store::ChangesetStore;

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Where the local mirror stands relative to the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No revisions imported yet.
    Uninitialized,
    /// The newest known revision equals the repository tip.
    Synced,
    /// The tip has moved past the newest known revision.
    Behind,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Synced => write!(f, "synced"),
            Self::Behind => write!(f, "behind"),
        }
    }
}

/// Counters from one import pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SyncStats {
    /// Revisions persisted by this pass.
    pub imported: usize,
    /// Revisions skipped: already present, persisted by a racing run, or
    /// (during bulk import) failed to persist.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives history import for one repository into one store.
pub struct SyncEngine<'a, S: ChangesetStore> {
    adapter: &'a GitAdapter,
    store: &'a S,
    repository: &'a str,
}

impl<'a, S: ChangesetStore> SyncEngine<'a, S> {
    pub fn new(adapter: &'a GitAdapter, store: &'a S, repository: &'a str) -> Self {
        Self {
            adapter,
            store,
            repository,
        }
    }

    /// Compute the current sync state without importing anything.
    pub async fn state(&self) -> Result<SyncState, SyncError> {
        let Some(latest) = self.store.latest(self.repository)? else {
            return Ok(SyncState::Uninitialized);
        };
        let tip = self.tip().await?;
        if latest.scmid == tip.scmid || self.store.exists(self.repository, &tip.scmid)? {
            Ok(SyncState::Synced)
        } else {
            Ok(SyncState::Behind)
        }
    }

    /// Run one import pass.
    pub async fn fetch_changesets(&self) -> Result<SyncStats, SyncError> {
        let tip = self.tip().await?;

        match self.store.latest(self.repository)? {
            None => self.bulk_import().await,
            Some(latest) => {
                if self.store.exists(self.repository, &tip.scmid)? {
                    debug!(repository = self.repository, tip = %tip.scmid, "already synced");
                    Ok(SyncStats::default())
                } else {
                    self.incremental_import(&latest).await
                }
            }
        }
    }

    /// The repository tip. An unreadable repository stops the engine; the
    /// query-side probe semantics do not apply here.
    async fn tip(&self) -> Result<Revision, SyncError> {
        let info = self.adapter.info().await?;
        info.map(|info| info.lastrev).ok_or_else(|| {
            SyncError::RepositoryUnavailable(self.adapter.root_url().display().to_string())
        })
    }

    /// Full-history import into an empty store. Individual failures are
    /// logged and skipped; a corrupt commit must never block the rest of
    /// the history.
    async fn bulk_import(&self) -> Result<SyncStats, SyncError> {
        info!(repository = self.repository, "store is empty, performing bulk import");
        let options = RevisionsOptions {
            reverse: true,
            all: true,
            ..Default::default()
        };
        let revisions = self.adapter.revisions(None, None, None, &options).await?;

        let mut stats = SyncStats::default();
        for revision in revisions {
            if self.store.exists(self.repository, &revision.scmid)? {
                stats.skipped += 1;
                continue;
            }
            match self.store.save(self.repository, &revision) {
                Ok(()) => stats.imported += 1,
                Err(StoreError::Duplicate { .. }) => {
                    debug!(scmid = %revision.scmid, "revision persisted by a concurrent run");
                    stats.skipped += 1;
                }
                Err(e) => {
                    warn!(scmid = %revision.scmid, error = %e, "failed to persist revision, skipping");
                    stats.skipped += 1;
                }
            }
        }
        info!(
            repository = self.repository,
            imported = stats.imported,
            skipped = stats.skipped,
            "bulk import complete"
        );
        Ok(stats)
    }

    /// Import the range strictly newer than the stored watermark. A
    /// persistence failure here surfaces to the caller; only a duplicate
    /// (racing importer) is skipped.
    async fn incremental_import(&self, latest: &Revision) -> Result<SyncStats, SyncError> {
        info!(repository = self.repository, since = %latest.scmid, "importing new revisions");
        let options = RevisionsOptions {
            reverse: true,
            ..Default::default()
        };
        let revisions = self
            .adapter
            .revisions(None, Some(&latest.scmid), None, &options)
            .await?;

        let mut stats = SyncStats::default();
        for revision in revisions {
            if self.store.exists(self.repository, &revision.scmid)? {
                stats.skipped += 1;
                continue;
            }
            match self.store.save(self.repository, &revision) {
                Ok(()) => stats.imported += 1,
                Err(StoreError::Duplicate { .. }) => {
                    debug!(scmid = %revision.scmid, "revision persisted by a concurrent run");
                    stats.skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        info!(
            repository = self.repository,
            imported = stats.imported,
            skipped = stats.skipped,
            "incremental import complete"
        );
        Ok(stats)
    }
}
