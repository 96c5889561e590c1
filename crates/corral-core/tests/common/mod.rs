//! Common test utilities for corral-core integration tests.
//!
//! Builds throwaway git repositories under a tempdir. The repository is
//! created inside a wrapper directory so agent worktrees, which land in the
//! repository's parent, stay inside the tempdir too.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    dead_code
)]

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use tempfile::TempDir;

/// A scratch repository wired to a local bare "origin".
pub struct TestRepo {
    /// Keeps the tempdir alive for the duration of the test.
    pub root: TempDir,
    /// Path to the working repository (a subdirectory of `root`).
    pub repo: PathBuf,
    /// Path to the bare upstream repository.
    pub origin: PathBuf,
}

/// Run git with the given args, panicking on failure. Test setup only.
pub fn git(cwd: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("failed to spawn git");
    assert!(
        output.status.success(),
        "git {args:?} failed in {}: {}",
        cwd.display(),
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Run git and return trimmed stdout, panicking on failure.
pub fn git_stdout(cwd: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("failed to spawn git");
    assert!(
        output.status.success(),
        "git {args:?} failed in {}: {}",
        cwd.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Whether a worktree currently has a merge in progress.
pub fn merge_in_progress(worktree: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "-q", "--verify", "MERGE_HEAD"])
        .current_dir(worktree)
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Set up a repository on branch `main` with one commit, pushed to a local
/// bare origin so `fetch origin` and `origin/main` work.
pub fn setup_test_repo() -> TestRepo {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let root = tempfile::tempdir().expect("tempdir");
    let origin = root.path().join("origin.git");
    let repo = root.path().join("repo");

    git(root.path(), &["init", "--bare", "origin.git"]);
    std::fs::create_dir(&repo).expect("create repo dir");

    git(&repo, &["init"]);
    git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(&repo, &["config", "user.name", "Test Agent"]);
    git(&repo, &["config", "user.email", "test@example.com"]);
    git(&repo, &["config", "commit.gpgsign", "false"]);
    git(&repo, &["remote", "add", "origin", origin.to_str().unwrap()]);

    std::fs::write(repo.join("file.txt"), "line one\n").expect("seed file");
    git(&repo, &["add", "-A"]);
    git(&repo, &["commit", "-m", "initial commit"]);
    git(&repo, &["push", "-u", "origin", "main"]);

    TestRepo { root, repo, origin }
}

/// Commit a change to `file` on `main` in the shared repo and push it to
/// origin, simulating upstream progress.
pub fn push_upstream_change(test_repo: &TestRepo, file: &str, content: &str) {
    git(&test_repo.repo, &["checkout", "main"]);
    std::fs::write(test_repo.repo.join(file), content).expect("write upstream change");
    git(&test_repo.repo, &["add", "-A"]);
    git(&test_repo.repo, &["commit", "-m", "upstream change"]);
    git(&test_repo.repo, &["push", "origin", "main"]);
}
