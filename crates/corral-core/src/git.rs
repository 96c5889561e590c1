//! Git subprocess execution.
//!
//! The runner invokes the `git` binary with a bounded timeout and reports a
//! uniform `(code, stdout, stderr)` result. It never fails on ordinary
//! command failure and never interprets command semantics; interpretation of
//! diagnostic text lives in [`GitOutcome`], the single adapter all textual
//! scraping goes through.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::process::Command;

use crate::{Error, Result};

/// Per-invocation timeout applied to every git call.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Uniform result of one git invocation.
///
/// Timeout and spawn failure are folded into a sentinel value (`code == -1`,
/// empty stdout, descriptive stderr) rather than surfaced as errors.
#[derive(Debug, Clone)]
pub struct GitOutput {
    /// Process exit code, or `-1` for timeout/spawn failure.
    pub code: i32,
    /// Trimmed standard output.
    pub stdout: String,
    /// Trimmed standard error.
    pub stderr: String,
}

impl GitOutput {
    /// Whether the command exited zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout and stderr joined for diagnostic scanning. Git splits its
    /// merge diagnostics across both streams.
    #[must_use]
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    fn sentinel(reason: impl Into<String>) -> Self {
        Self {
            code: -1,
            stdout: String::new(),
            stderr: reason.into(),
        }
    }
}

/// Executes git commands against one repository, each bounded by a fixed
/// timeout.
#[derive(Debug, Clone)]
pub struct GitRunner {
    repo_path: PathBuf,
    timeout: Duration,
}

impl GitRunner {
    /// Create a runner rooted at the given repository path.
    #[must_use]
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    /// Override the per-invocation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run git in the repository root.
    pub async fn run(&self, args: &[&str]) -> GitOutput {
        self.run_in(&self.repo_path, args).await
    }

    /// Run git in an arbitrary working directory (a worktree, usually).
    pub async fn run_in(&self, cwd: &Path, args: &[&str]) -> GitOutput {
        let mut command = Command::new("git");
        command.args(args).current_dir(cwd).kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => GitOutput {
                code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            },
            Ok(Err(e)) => GitOutput::sentinel(format!("failed to spawn git: {e}")),
            Err(_) => GitOutput::sentinel(format!(
                "git {} timed out after {:?}",
                args.first().copied().unwrap_or_default(),
                self.timeout
            )),
        }
    }
}

/// Tagged interpretation of a git invocation's diagnostic output.
///
/// All knowledge of git's diagnostic phrasing is concentrated here so the
/// coordinator can branch on variants instead of scraping strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitOutcome {
    /// Command exited zero.
    Success,
    /// The ref or path to create already exists.
    AlreadyExists,
    /// A merge hit conflicting changes.
    Conflict,
    /// Commit had no staged changes.
    NothingToCommit,
    /// Any other non-zero exit.
    Failed,
}

impl GitOutcome {
    /// Classify an invocation result.
    #[must_use]
    pub fn classify(output: &GitOutput) -> Self {
        if output.success() {
            return Self::Success;
        }

        let text = output.combined();
        if text.contains("already exists") {
            Self::AlreadyExists
        } else if text.contains("CONFLICT") || text.contains("Automatic merge failed") {
            Self::Conflict
        } else if text.contains("nothing to commit") || text.contains("nothing added to commit") {
            Self::NothingToCommit
        } else {
            Self::Failed
        }
    }
}

/// One entry from `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeEntry {
    /// Absolute worktree directory.
    pub path: PathBuf,
    /// Checked-out commit, when the worktree is not bare.
    pub head: Option<String>,
    /// Checked-out branch (without the `refs/heads/` prefix), when not
    /// detached.
    pub branch: Option<String>,
}

/// Parse `git worktree list --porcelain` output.
///
/// Entries are attribute blocks separated by blank lines:
///
/// ```text
/// worktree /path/to/checkout
/// HEAD 0123abcd...
/// branch refs/heads/agent/a1
/// ```
#[must_use]
pub fn parse_worktree_list(output: &str) -> Vec<WorktreeEntry> {
    let mut entries = Vec::new();
    let mut current: Option<WorktreeEntry> = None;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
        } else if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(WorktreeEntry {
                path: PathBuf::from(path),
                head: None,
                branch: None,
            });
        } else if let Some(head) = line.strip_prefix("HEAD ") {
            if let Some(entry) = current.as_mut() {
                entry.head = Some(head.to_string());
            }
        } else if let Some(branch) = line.strip_prefix("branch ") {
            if let Some(entry) = current.as_mut() {
                let name = branch.strip_prefix("refs/heads/").unwrap_or(branch);
                entry.branch = Some(name.to_string());
            }
        }
    }

    if let Some(entry) = current.take() {
        entries.push(entry);
    }

    entries
}

/// Check that a `git` executable is reachable on the execution path.
///
/// # Errors
///
/// Returns `Error::Configuration` if git is not installed.
pub fn check_git_installed() -> Result<PathBuf> {
    which::which("git").map_err(|e| Error::configuration(format!("git executable not found: {e}")))
}
