//! Error types for the GitMirror core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! A non-zero exit from the `git` tool ([`GitError::CommandFailed`]) is a
//! normal "no result" outcome for query operations and is translated to
//! `Ok(None)` by the adapter. A launch failure ([`GitError::BinaryNotFound`],
//! [`GitError::Io`]) indicates a broken environment and always surfaces.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from driving the external `git` tool.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// A `git` command ran but exited with a non-zero status.
    #[error("git command failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        exit_code: i32,
        stderr: String,
    },

    /// The child process could not be spawned or its output read.
    #[error("git I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Errors from the changeset persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying rusqlite error.
    #[error("store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A changeset with this scm id is already persisted for the repository.
    ///
    /// Duplicate detection is the store's correctness mechanism against
    /// racing sync runs; callers treat this as "already imported".
    #[error("changeset {scmid} already exists in repository '{repository}'")]
    Duplicate {
        repository: String,
        scmid: String,
    },

    /// A persisted record could not be reconstructed.
    #[error("corrupt changeset record {scmid}: {detail}")]
    InvalidRecord {
        scmid: String,
        detail: String,
    },

    /// Generic I/O error (e.g. file permissions).
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Sync engine errors
// ---------------------------------------------------------------------------

/// Errors from the history import engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The repository tip could not be read; nothing can be imported.
    #[error("repository unavailable at '{0}'")]
    RepositoryUnavailable(String),

    /// Underlying git error during sync.
    #[error("sync git error: {0}")]
    Git(#[from] GitError),

    /// Underlying store error during sync.
    #[error("sync store error: {0}")]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    Parse(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = GitError::BinaryNotFound("git".into());
        assert_eq!(err.to_string(), "git binary not found: git");

        let err = GitError::CommandFailed {
            exit_code: 128,
            stderr: "fatal: not a git repository".into(),
        };
        assert!(err.to_string().contains("exit 128"));

        let err = StoreError::Duplicate {
            repository: "main".into(),
            scmid: "abc123".into(),
        };
        assert!(err.to_string().contains("abc123"));

        let err = SyncError::RepositoryUnavailable("/srv/repo.git".into());
        assert!(err.to_string().contains("/srv/repo.git"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let git_err = GitError::BinaryNotFound("git".into());
        let core_err: CoreError = git_err.into();
        assert!(matches!(core_err, CoreError::Git(_)));

        let sync_err = SyncError::RepositoryUnavailable("/tmp/x".into());
        let core_err: CoreError = sync_err.into();
        assert!(matches!(core_err, CoreError::Sync(_)));
    }
}
