//! Upstream sync and conflict detection against a real git repository.

mod common;

use corral_core::{WorkspaceCoordinator, DEFAULT_BASE_BRANCH};

use common::{merge_in_progress, push_upstream_change, setup_test_repo};

#[tokio::test]
async fn check_conflicts_clean_branch_returns_empty() -> Result<(), Box<dyn std::error::Error>> {
    let test_repo = setup_test_repo();
    let mut coordinator = WorkspaceCoordinator::open(&test_repo.repo)?;
    let info = coordinator
        .create_workspace("a1", DEFAULT_BASE_BRANCH)
        .await?;

    let conflicts = coordinator.check_conflicts("a1", "main").await?;
    assert!(conflicts.is_empty());
    assert!(
        !merge_in_progress(&info.worktree_path),
        "probe must leave no merge in progress"
    );
    Ok(())
}

#[tokio::test]
async fn check_conflicts_detects_same_line_divergence() -> Result<(), Box<dyn std::error::Error>> {
    let test_repo = setup_test_repo();
    let mut coordinator = WorkspaceCoordinator::open(&test_repo.repo)?;
    let info = coordinator
        .create_workspace("a1", DEFAULT_BASE_BRANCH)
        .await?;

    // Agent and upstream both rewrite the same line of file.txt.
    std::fs::write(info.worktree_path.join("file.txt"), "agent version\n")?;
    coordinator
        .commit_work("a1", "rewrite file")
        .await?
        .expect("agent commit");
    push_upstream_change(&test_repo, "file.txt", "upstream version\n");

    let conflicts = coordinator.check_conflicts("a1", "main").await?;
    assert!(!conflicts.is_empty(), "divergent edits must conflict");
    assert!(
        conflicts
            .iter()
            .any(|c| c.file.as_deref() == Some("file.txt") || c.detail.contains("file.txt")),
        "conflict entries must reference the conflicting path"
    );
    assert!(
        !merge_in_progress(&info.worktree_path),
        "probe must abort the trial merge even on conflict"
    );

    // The probe is repeatable: the aborted merge left nothing behind.
    let again = coordinator.check_conflicts("a1", "main").await?;
    assert_eq!(conflicts.len(), again.len());
    Ok(())
}

#[tokio::test]
async fn sync_from_upstream_merges_clean_changes() -> Result<(), Box<dyn std::error::Error>> {
    let test_repo = setup_test_repo();
    let mut coordinator = WorkspaceCoordinator::open(&test_repo.repo)?;
    let info = coordinator
        .create_workspace("a1", DEFAULT_BASE_BRANCH)
        .await?;

    // Diverge without overlap: agent adds one file, upstream another.
    std::fs::write(info.worktree_path.join("agent.txt"), "agent work\n")?;
    coordinator
        .commit_work("a1", "agent work")
        .await?
        .expect("agent commit");
    push_upstream_change(&test_repo, "upstream.txt", "upstream work\n");

    assert!(coordinator.sync_from_upstream("a1").await?);
    assert!(
        info.worktree_path.join("upstream.txt").is_file(),
        "upstream change must land in the agent worktree"
    );
    Ok(())
}

#[tokio::test]
async fn sync_from_upstream_reports_conflict_as_false() -> Result<(), Box<dyn std::error::Error>> {
    let test_repo = setup_test_repo();
    let mut coordinator = WorkspaceCoordinator::open(&test_repo.repo)?;
    let info = coordinator
        .create_workspace("a1", DEFAULT_BASE_BRANCH)
        .await?;

    std::fs::write(info.worktree_path.join("file.txt"), "agent version\n")?;
    coordinator
        .commit_work("a1", "rewrite file")
        .await?
        .expect("agent commit");
    push_upstream_change(&test_repo, "file.txt", "upstream version\n");

    assert!(!coordinator.sync_from_upstream("a1").await?);
    Ok(())
}
