//! Repository adapter: the query surface over one Git repository.
//!
//! Each [`GitAdapter`] owns a single repository handle and composes the
//! command runner with the record parsers to implement the repository
//! operations. `Ok(None)` is the "unavailable" channel: the queried
//! revision/path does not exist or the tool reported no applicable result.
//! Launch failures always surface as errors.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::parser::{self, LOG_FORMAT};
use super::runner::GitRunner;
use crate::errors::GitError;
use crate::models::{Annotation, Entry, Info, Revision};

/// Options for the `revisions` query.
#[derive(Debug, Clone, Default)]
pub struct RevisionsOptions {
    /// Cap on the number of revisions returned.
    pub limit: Option<usize>,
    /// Oldest-first ordering, as required by the sync engine.
    pub reverse: bool,
    /// Walk every branch instead of a single ref.
    pub all: bool,
}

/// Adapter over one physical Git repository.
pub struct GitAdapter {
    root_url: PathBuf,
    default_branch: Option<String>,
    runner: GitRunner,
}

impl GitAdapter {
    /// Create an adapter for the repository whose git-dir is at `root_url`.
    pub fn new(root_url: impl Into<PathBuf>) -> Self {
        let root_url = root_url.into();
        let runner = GitRunner::new(&root_url);
        Self {
            root_url,
            default_branch: None,
            runner,
        }
    }

    /// Override the default branch instead of resolving it from the
    /// repository's branch list.
    pub fn with_default_branch(mut self, branch: Option<String>) -> Self {
        self.default_branch = branch;
        self
    }

    pub fn root_url(&self) -> &Path {
        &self.root_url
    }

    // -----------------------------------------------------------------------
    // info / branches
    // -----------------------------------------------------------------------

    /// Latest revision of the default branch, or `None` when the repository
    /// cannot be read. This is the designated existence probe: an unreadable
    /// or empty repository is a recoverable outcome, not an error.
    pub async fn info(&self) -> Result<Option<Info>, GitError> {
        let options = RevisionsOptions {
            limit: Some(1),
            ..Default::default()
        };
        let revisions = match self.revisions(None, None, None, &options).await {
            Ok(revisions) => revisions,
            Err(GitError::CommandFailed { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(revisions.into_iter().next().map(|lastrev| Info {
            root_url: self.root_url.display().to_string(),
            lastrev,
        }))
    }

    /// Branch names known to the repository, sorted.
    pub async fn branches(&self) -> Result<Vec<String>, GitError> {
        let text = self
            .runner
            .output_text(&["for-each-ref", "--format=%(refname:short)", "refs/heads"])
            .await?;
        let mut branches: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        branches.sort();
        Ok(branches)
    }

    /// Resolve the default branch: the configured override, a branch named
    /// `master`, or the lexicographically first branch. `HEAD` when the
    /// repository has no branches yet, so downstream queries fail over to
    /// the unavailable channel.
    pub async fn default_branch(&self) -> Result<String, GitError> {
        if let Some(branch) = &self.default_branch {
            return Ok(branch.clone());
        }
        let branches = self.branches().await?;
        if branches.iter().any(|branch| branch == "master") {
            return Ok("master".to_string());
        }
        Ok(branches
            .into_iter()
            .next()
            .unwrap_or_else(|| "HEAD".to_string()))
    }

    // -----------------------------------------------------------------------
    // entries
    // -----------------------------------------------------------------------

    /// Immediate children of `path` at `identifier` (default branch tip when
    /// `None`), sorted by name and unique. Each entry carries the most
    /// recent revision touching it, found by a one-commit history query per
    /// entry; that secondary lookup is the dominant cost of this operation.
    pub async fn entries(
        &self,
        path: &str,
        identifier: Option<&str>,
    ) -> Result<Option<Vec<Entry>>, GitError> {
        let Some(rev) = suppress_exit(self.resolve_identifier(identifier).await)? else {
            return Ok(None);
        };
        let path = path.trim_matches('/');
        let treeish = if path.is_empty() {
            rev
        } else {
            format!("{rev}:{path}")
        };
        let listing = self
            .runner
            .output_text(&["ls-tree", "-l", treeish.as_str()])
            .await;
        let Some(text) = suppress_exit(listing)? else {
            return Ok(None);
        };

        let mut entries = Vec::new();
        for tree_entry in parser::parse_ls_tree(&text) {
            let full_path = if path.is_empty() {
                tree_entry.name.clone()
            } else {
                format!("{path}/{}", tree_entry.name)
            };
            let lastrev = self.last_revision_for_path(&full_path).await?;
            entries.push(Entry {
                name: tree_entry.name,
                path: full_path,
                kind: tree_entry.kind,
                size: tree_entry.size,
                lastrev,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.dedup_by(|a, b| a.name == b.name);
        debug!(path, count = entries.len(), "listed entries");
        Ok(Some(entries))
    }

    /// Most recent revision touching `path`, across all branches.
    async fn last_revision_for_path(&self, path: &str) -> Result<Option<Revision>, GitError> {
        let options = RevisionsOptions {
            limit: Some(1),
            all: true,
            ..Default::default()
        };
        let revisions = self.revisions(Some(path), None, None, &options).await?;
        Ok(revisions.into_iter().next())
    }

    // -----------------------------------------------------------------------
    // revisions
    // -----------------------------------------------------------------------

    /// Commit history, newest-first unless `options.reverse`.
    ///
    /// `path: None` means whole-repository history; the `Option` is the
    /// sentinel, so a path literally named like any marker string cannot
    /// collide with it. Merge commits are excluded from the stream.
    pub async fn revisions(
        &self,
        path: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
        options: &RevisionsOptions,
    ) -> Result<Vec<Revision>, GitError> {
        let mut args: Vec<String> = vec![
            "log".into(),
            "--no-merges".into(),
            format!("--pretty=format:{LOG_FORMAT}"),
            "--name-status".into(),
        ];
        if options.reverse {
            args.push("--reverse".into());
        }
        if let Some(limit) = options.limit {
            args.push(format!("--max-count={limit}"));
        }
        if options.all {
            args.push("--all".into());
        }
        if let Some(range) = self.rev_range(from, to, options.all).await? {
            args.push(range);
        }
        if let Some(path) = path.filter(|p| !p.is_empty()) {
            args.push("--".into());
            args.push(path.into());
        }

        let text = self.runner.output_text(&args).await?;
        Ok(parser::parse_log(&text)
            .into_iter()
            .map(parser::LogEntry::into_revision)
            .collect())
    }

    /// Build the revision range argument. The default branch is resolved
    /// per call, never cached: the tip can move between calls.
    async fn rev_range(
        &self,
        from: Option<&str>,
        to: Option<&str>,
        all: bool,
    ) -> Result<Option<String>, GitError> {
        match (from, to) {
            (Some(from), Some(to)) => Ok(Some(format!("{from}..{to}"))),
            (Some(from), None) => {
                let tip = self.default_branch().await?;
                Ok(Some(format!("{from}..{tip}")))
            }
            (None, Some(to)) => Ok(Some(to.to_string())),
            (None, None) if all => Ok(None),
            (None, None) => Ok(Some(self.default_branch().await?)),
        }
    }

    // -----------------------------------------------------------------------
    // diff
    // -----------------------------------------------------------------------

    /// Unified diff lines between two revisions, or the changes introduced
    /// by `from` when `to` is `None`. `None` when the tool exits non-zero
    /// or reports no differences; an empty diff and an unknown revision
    /// share the unavailable channel.
    pub async fn diff(
        &self,
        path: &str,
        from: &str,
        to: Option<&str>,
    ) -> Result<Option<Vec<String>>, GitError> {
        let mut args: Vec<String> = match to {
            None => vec!["show".into(), from.into()],
            Some(to) => vec!["diff".into(), to.into(), from.into()],
        };
        if !path.is_empty() {
            args.push("--".into());
            args.push(path.into());
        }
        let Some(text) = suppress_exit(self.runner.output_text(&args).await)? else {
            return Ok(None);
        };
        let lines: Vec<String> = text.lines().map(String::from).collect();
        if lines.is_empty() {
            return Ok(None);
        }
        Ok(Some(lines))
    }

    // -----------------------------------------------------------------------
    // annotate / cat
    // -----------------------------------------------------------------------

    /// Per-line attribution for `path` at `identifier`, or `None` when the
    /// file is binary or the tool fails.
    pub async fn annotate(
        &self,
        path: &str,
        identifier: Option<&str>,
    ) -> Result<Option<Annotation>, GitError> {
        let Some(rev) = suppress_exit(self.resolve_identifier(identifier).await)? else {
            return Ok(None);
        };
        let blame = self
            .runner
            .output(&["blame", "-l", rev.as_str(), "--", path])
            .await;
        let Some(bytes) = suppress_exit(blame)? else {
            return Ok(None);
        };
        Ok(parser::parse_blame(&bytes))
    }

    /// Raw bytes of `path` at `identifier`, or `None` on failure.
    pub async fn cat(
        &self,
        path: &str,
        identifier: Option<&str>,
    ) -> Result<Option<Vec<u8>>, GitError> {
        let Some(rev) = suppress_exit(self.resolve_identifier(identifier).await)? else {
            return Ok(None);
        };
        let object = format!("{rev}:{path}");
        suppress_exit(self.runner.output(&["show", object.as_str()]).await)
    }

    /// An empty identifier always means the tip of the default branch,
    /// resolved once per call.
    async fn resolve_identifier(&self, identifier: Option<&str>) -> Result<String, GitError> {
        match identifier.filter(|id| !id.is_empty()) {
            Some(id) => Ok(id.to_string()),
            None => self.default_branch().await,
        }
    }
}

/// Translate a non-zero tool exit into the unavailable channel, keeping
/// launch failures as errors.
fn suppress_exit<T>(result: Result<T, GitError>) -> Result<Option<T>, GitError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(GitError::CommandFailed { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppress_exit_keeps_launch_failures() {
        let failed: Result<(), GitError> = Err(GitError::CommandFailed {
            exit_code: 128,
            stderr: "fatal".into(),
        });
        assert!(matches!(suppress_exit(failed), Ok(None)));

        let ok: Result<u8, GitError> = Ok(7);
        assert!(matches!(suppress_exit(ok), Ok(Some(7))));

        let launch: Result<(), GitError> = Err(GitError::BinaryNotFound("git".into()));
        assert!(suppress_exit(launch).is_err());
    }

    #[tokio::test]
    async fn test_info_on_missing_repository_is_unavailable() {
        let adapter = GitAdapter::new("/nonexistent/repo.git");
        match adapter.info().await {
            Ok(None) => {}
            // Without git installed the probe surfaces a launch failure,
            // which is the designed hard-error path.
            Err(GitError::BinaryNotFound(_)) => {}
            other => panic!("expected unavailable, got {other:?}"),
        }
    }
}
