//! Domain model types used throughout GitMirror.
//!
//! These types bridge the adapter, the sync engine and the store layer.
//! A [`Revision`] is immutable once built; the parser assembles it from one
//! raw log record and the store persists it exactly once per repository,
//! keyed by its scm id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Changed paths
// ---------------------------------------------------------------------------

/// What happened to a path in a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Added,
    Deleted,
    Modified,
}

impl ChangeAction {
    /// Classify a `--name-status` status field.
    ///
    /// Renames, copies and type changes all fall back to `Modified`; only the
    /// leading letter is inspected so scored statuses like `R100` are handled.
    pub fn from_status(status: &str) -> Self {
        match status.as_bytes().first() {
            Some(b'A') => Self::Added,
            Some(b'D') => Self::Deleted,
            _ => Self::Modified,
        }
    }

    /// Single-letter form used by the store and the CLI.
    pub fn as_letter(&self) -> &'static str {
        match self {
            Self::Added => "A",
            Self::Deleted => "D",
            Self::Modified => "M",
        }
    }

    /// Parse the single-letter form back into an action.
    pub fn from_letter(letter: &str) -> Self {
        Self::from_status(letter)
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_letter())
    }
}

/// One path touched by a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedPath {
    pub action: ChangeAction,
    pub path: String,
}

// ---------------------------------------------------------------------------
// Revision
// ---------------------------------------------------------------------------

/// One commit's structured metadata plus its changed paths.
///
/// `identifier` and `scmid` carry the same value for Git; they are kept
/// distinct because other VCS backends differentiate logical from physical
/// revision ids and the store contract is keyed by `scmid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub identifier: String,
    pub scmid: String,
    /// Author in `name <email>` form.
    pub author: String,
    pub committed_on: DateTime<Utc>,
    pub message: String,
    /// Changed paths in diff-against-parent order.
    pub paths: Vec<ChangedPath>,
}

/// A minimal reference to a revision, as carried by blame lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRef {
    pub identifier: String,
    pub author: String,
}

// ---------------------------------------------------------------------------
// Repository info
// ---------------------------------------------------------------------------

/// Summary of a repository: its root location and branch tip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    pub root_url: String,
    pub lastrev: Revision,
}

// ---------------------------------------------------------------------------
// Directory entries
// ---------------------------------------------------------------------------

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Dir,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Dir => write!(f, "dir"),
        }
    }
}

/// One child of a directory at a given revision.
///
/// Recomputed fresh on every `entries` query; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    /// Full path from the repository root.
    pub path: String,
    pub kind: EntryKind,
    /// Byte size, present only for files when the tree listing exposes it.
    pub size: Option<u64>,
    /// Most recent revision touching this path, across all branches.
    pub lastrev: Option<Revision>,
}

// ---------------------------------------------------------------------------
// Annotation (blame)
// ---------------------------------------------------------------------------

/// Per-line attribution for a file at a revision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Annotation {
    pub lines: Vec<AnnotationLine>,
}

/// One annotated source line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationLine {
    pub content: String,
    pub revision: RevisionRef,
}

impl Annotation {
    pub fn add_line(&mut self, content: String, revision: RevisionRef) {
        self.lines.push(AnnotationLine { content, revision });
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
