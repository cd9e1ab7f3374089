//! TOML-based configuration for GitMirror.
//!
//! The git executable name is published process-wide once at startup via
//! [`set_git_bin`] and is read-only thereafter; every [`GitRunner`] reads it
//! through [`git_bin`].
//!
//! [`GitRunner`]: crate::git::runner::GitRunner

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Process-wide git executable name
// ---------------------------------------------------------------------------

static GIT_BIN: OnceLock<String> = OnceLock::new();

/// Publish the git executable name for the whole process.
///
/// The first call wins; later calls are ignored with a warning, keeping the
/// value read-only after startup.
pub fn set_git_bin(bin: impl Into<String>) {
    let bin = bin.into();
    if GIT_BIN.set(bin.clone()).is_err() {
        let current = git_bin();
        if current != bin {
            warn!(requested = %bin, current, "git executable already set, keeping current value");
        }
    } else {
        debug!(bin = %git_bin(), "git executable configured");
    }
}

/// The configured git executable name, `"git"` unless overridden at startup.
pub fn git_bin() -> &'static str {
    GIT_BIN.get().map(String::as_str).unwrap_or("git")
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The mirrored repository.
    pub repository: RepositoryConfig,

    /// Changeset store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Repository location and adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Local filesystem path to the repository's git-dir
    /// (e.g. `/srv/repos/project.git` or `/home/me/project/.git`).
    pub url: PathBuf,

    /// Identifier under which changesets are persisted in the store.
    pub identifier: String,

    /// Default branch override. When unset the adapter prefers `master`,
    /// then the lexicographically first branch.
    #[serde(default)]
    pub default_branch: Option<String>,

    /// Name of the git executable to invoke.
    #[serde(default = "default_git_bin")]
    pub git_bin: String,
}

/// Changeset store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_git_bin() -> String {
    "git".into()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("gitmirror.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        debug!(path = %path.display(), repository = %config.repository.identifier, "configuration loaded");
        Ok(config)
    }

    /// Check for obviously broken values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repository.url.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "repository.url".into(),
                detail: "must not be empty".into(),
            });
        }
        if self.repository.identifier.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "repository.identifier".into(),
                detail: "must not be empty".into(),
            });
        }
        if self.repository.git_bin.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "repository.git_bin".into(),
                detail: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Template for a fresh configuration file.
    pub fn generate_default() -> &'static str {
        r#"# GitMirror configuration

[repository]
# Local path to the repository's git-dir.
url = "/srv/repos/project.git"
# Key under which changesets are stored.
identifier = "project"
# default_branch = "main"
git_bin = "git"

[store]
db_path = "/var/lib/gitmirror/gitmirror.db"

log_level = "info"
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
[repository]
url = "/srv/repos/project.git"
identifier = "project"
"#
    }

    #[test]
    fn test_parse_minimal_config_applies_defaults() {
        let config: AppConfig = toml::from_str(minimal_toml()).unwrap();
        assert_eq!(config.repository.git_bin, "git");
        assert_eq!(config.repository.default_branch, None);
        assert_eq!(config.store.db_path, PathBuf::from("gitmirror.db"));
        assert_eq!(config.log_level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_generate_default_parses_and_validates() {
        let config: AppConfig = toml::from_str(AppConfig::generate_default()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.repository.identifier, "project");
    }

    #[test]
    fn test_validate_rejects_empty_identifier() {
        let text = r#"
[repository]
url = "/srv/repos/project.git"
identifier = "  "
"#;
        let config: AppConfig = toml::from_str(text).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            crate::errors::ConfigError::InvalidValue { ref field, .. } if field == "repository.identifier"
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load("/nonexistent/gitmirror.toml").unwrap_err();
        assert!(matches!(err, crate::errors::ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_git_bin_is_always_nonempty() {
        assert!(!git_bin().is_empty());
        // Repeated sets never change an already-published value.
        set_git_bin(git_bin().to_string());
        set_git_bin("other-git");
        assert_ne!(git_bin(), "other-git");
    }
}
