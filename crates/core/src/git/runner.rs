//! Asynchronous execution of the external `git` tool.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::config;
use crate::errors::GitError;

/// Runs git commands against one repository's git-dir.
///
/// Output is captured as raw bytes so callers can check for binary content
/// before any text processing. `Command::output` waits for process exit and
/// closes both pipes on every path, so no handles outlive a call even when
/// the consumer errors partway through its own processing.
#[derive(Debug, Clone)]
pub struct GitRunner {
    git_dir: PathBuf,
}

impl GitRunner {
    pub fn new(git_dir: impl Into<PathBuf>) -> Self {
        Self {
            git_dir: git_dir.into(),
        }
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Run `git --git-dir <dir> <args...>` and return raw stdout bytes.
    ///
    /// A non-zero exit yields [`GitError::CommandFailed`]; a process that
    /// could not be launched yields [`GitError::BinaryNotFound`] or
    /// [`GitError::Io`]. The two cases must stay distinguishable: the former
    /// is a normal "no result" for query operations, the latter is a broken
    /// environment.
    pub async fn output<S: AsRef<std::ffi::OsStr>>(&self, args: &[S]) -> Result<Vec<u8>, GitError> {
        let mut cmd = Command::new(config::git_bin());
        cmd.arg("--git-dir")
            .arg(&self.git_dir)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(git_dir = %self.git_dir.display(), "running git command");
        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::BinaryNotFound(config::git_bin().to_string())
            } else {
                GitError::Io(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, %stderr, "git command failed");
            return Err(GitError::CommandFailed { exit_code, stderr });
        }
        Ok(output.stdout)
    }

    /// Run a git command and return stdout as (lossily decoded) text.
    pub async fn output_text<S: AsRef<std::ffi::OsStr>>(
        &self,
        args: &[S],
    ) -> Result<String, GitError> {
        let bytes = self.output(args).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
