//! GitMirror core library.
//!
//! Mirrors a Git repository's commit history into a queryable SQLite
//! representation and answers path-scoped queries (entries, diff, blame,
//! file content) against the live repository by driving the `git` CLI and
//! parsing its output.

pub mod config;
pub mod errors;
pub mod git;
pub mod models;
pub mod store;
pub mod sync_engine;

// Re-exports for convenience.
pub use config::AppConfig;
pub use git::adapter::{GitAdapter, RevisionsOptions};
pub use store::{ChangesetStore, SqliteStore};
pub use sync_engine::{SyncEngine, SyncState, SyncStats};
