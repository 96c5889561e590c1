//! Merge conflict detection via trial merge.
//!
//! The probe attempts a non-committing, non-fast-forward merge in an
//! agent's worktree, extracts conflict descriptors from git's diagnostic
//! text, and always aborts the merge afterward. Whatever the outcome, the
//! worktree is left in a clean, non-merging state.
//!
//! Extraction is textual, not structural: it depends on git's stable
//! convention of emitting `CONFLICT` lines during a conflicted merge.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::git::GitRunner;

/// Marker string git emits for each conflicted path.
pub const CONFLICT_MARKER: &str = "CONFLICT";

/// One conflict reported by a trial merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict {
    /// Conflicting path, when it could be extracted from the diagnostic.
    pub file: Option<String>,
    /// The full diagnostic line.
    pub detail: String,
}

/// Whether diagnostic output contains the conflict marker.
#[must_use]
pub fn has_conflict_marker(output: &str) -> bool {
    output.contains(CONFLICT_MARKER)
}

/// Extract conflict descriptors from merge diagnostic output.
///
/// Content conflicts read `CONFLICT (content): Merge conflict in <path>`;
/// other kinds (modify/delete, rename) keep the raw line with no extracted
/// path.
#[must_use]
pub fn parse_conflicts(output: &str) -> Vec<MergeConflict> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.contains(CONFLICT_MARKER))
        .map(|line| MergeConflict {
            file: line
                .split_once("Merge conflict in ")
                .map(|(_, path)| path.trim().to_string()),
            detail: line.to_string(),
        })
        .collect()
}

/// Probe whether merging `origin/<target_branch>` into the branch checked
/// out at `worktree` would conflict.
///
/// The merge is never committed and is always aborted, so the worktree is
/// back in a non-merging state when this returns. The abort is expected to
/// fail when the merge fast-completed or never started; that failure is
/// ignored.
pub async fn trial_merge(
    runner: &GitRunner,
    worktree: &Path,
    target_branch: &str,
) -> Vec<MergeConflict> {
    let target = format!("origin/{target_branch}");
    let merge = runner
        .run_in(worktree, &["merge", "--no-commit", "--no-ff", &target])
        .await;

    // Unconditional restore: a --no-commit merge leaves MERGE_HEAD behind
    // even on success.
    let _ = runner.run_in(worktree, &["merge", "--abort"]).await;

    if merge.success() {
        return Vec::new();
    }

    let diagnostics = merge.combined();
    if has_conflict_marker(&diagnostics) {
        parse_conflicts(&diagnostics)
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_marker_means_no_conflicts() {
        assert!(!has_conflict_marker("Already up to date."));
        assert!(parse_conflicts("Already up to date.").is_empty());
    }

    #[test]
    fn content_conflict_extracts_path() {
        let output = "Auto-merging src/lib.rs\n\
                      CONFLICT (content): Merge conflict in src/lib.rs\n\
                      Automatic merge failed; fix conflicts and then commit the result.";

        let conflicts = parse_conflicts(output);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].file.as_deref(), Some("src/lib.rs"));
        assert!(conflicts[0].detail.contains("src/lib.rs"));
    }

    #[test]
    fn multiple_conflicts_all_reported() {
        let output = "CONFLICT (content): Merge conflict in a.txt\n\
                      CONFLICT (content): Merge conflict in b.txt";

        let conflicts = parse_conflicts(output);
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].file.as_deref(), Some("a.txt"));
        assert_eq!(conflicts[1].file.as_deref(), Some("b.txt"));
    }

    #[test]
    fn modify_delete_conflict_keeps_raw_line() {
        let output = "CONFLICT (modify/delete): a.txt deleted in HEAD and \
                      modified in origin/main.";

        let conflicts = parse_conflicts(output);
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].file.is_none());
        assert!(conflicts[0].detail.contains("a.txt"));
    }

    #[test]
    fn conflict_serializes_for_observers() {
        let conflict = MergeConflict {
            file: Some("a.txt".to_string()),
            detail: "CONFLICT (content): Merge conflict in a.txt".to_string(),
        };
        let json = serde_json::to_string(&conflict).unwrap();
        let back: MergeConflict = serde_json::from_str(&json).unwrap();
        assert_eq!(conflict, back);
    }
}
