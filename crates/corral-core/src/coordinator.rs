//! Workspace coordination for concurrent agents.
//!
//! Each agent gets a dedicated branch (`agent/<id>`) plus a dedicated
//! worktree, so concurrent agents never touch the same checkout. The
//! coordinator owns the in-memory registry, drives git through
//! [`GitRunner`], and writes every state change through to the
//! [`StatusStore`] - the status directory and the branch namespace are the
//! only channels other processes can observe.
//!
//! One coordinator instance per repository, explicitly constructed and
//! owned by whatever service needs it. Cross-process mutual exclusion is
//! out of scope; safety comes from per-agent isolation.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::{
    conflicts::{self, MergeConflict},
    git::{check_git_installed, parse_worktree_list, GitOutcome, GitRunner},
    status::StatusStore,
    types::{branch_for, validate_agent_id, worktree_path_for, AgentInfo, AgentStatus, SyncStatus},
    Error, Result,
};

/// Coordinates isolated branch-plus-worktree workspaces for agents sharing
/// one repository.
#[derive(Debug)]
pub struct WorkspaceCoordinator {
    repo_path: PathBuf,
    runner: GitRunner,
    store: StatusStore,
    agents: HashMap<String, AgentInfo>,
}

impl WorkspaceCoordinator {
    /// Open a coordinator for a repository root.
    ///
    /// Construction is configuration: it validates the root and creates the
    /// synchronization directory, so no operation can run unconfigured.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` when git is not installed, the path
    /// is not a directory, or it is not a git repository.
    pub fn open(repo_path: impl Into<PathBuf>) -> Result<Self> {
        let repo_path: PathBuf = repo_path.into();
        check_git_installed()?;

        if !repo_path.is_dir() {
            return Err(Error::configuration(format!(
                "repository path does not exist: {}",
                repo_path.display()
            )));
        }
        if !repo_path.join(".git").exists() {
            return Err(Error::configuration(format!(
                "not a git repository: {}",
                repo_path.display()
            )));
        }

        let store = StatusStore::open(&repo_path)?;
        info!("repository path set: {}", repo_path.display());

        Ok(Self {
            runner: GitRunner::new(&repo_path),
            repo_path,
            store,
            agents: HashMap::new(),
        })
    }

    /// The configured repository root.
    #[must_use]
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Snapshot of the in-memory registry.
    #[must_use]
    pub fn list_agents(&self) -> Vec<AgentInfo> {
        self.agents.values().cloned().collect()
    }

    /// Every readable status record in the synchronization directory.
    ///
    /// Malformed records are skipped, not surfaced; this is the polling
    /// channel and must stay available when one writer misbehaves.
    ///
    /// # Errors
    ///
    /// Returns an error only when the directory itself cannot be listed.
    pub fn list_all_statuses(&self) -> Result<Vec<SyncStatus>> {
        self.store.read_all()
    }

    /// Create an isolated workspace for an agent: a branch off
    /// `base_branch` plus a worktree checked out on it.
    ///
    /// The operation is idempotent. An existing branch is reused, an
    /// existing worktree directory is kept, so a retry after partial
    /// failure self-heals. If the worktree step fails after this call
    /// created the branch, the branch is deleted again before the error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidAgentId` for unusable ids and
    /// `Error::Coordination` when a required git step fails.
    pub async fn create_workspace(
        &mut self,
        agent_id: &str,
        base_branch: &str,
    ) -> Result<AgentInfo> {
        validate_agent_id(agent_id)?;
        let branch = branch_for(agent_id);
        let worktree = worktree_path_for(&self.repo_path, agent_id);

        // Ensure the agent branch exists, creating it from the base branch.
        let create = self
            .runner
            .run(&["checkout", "-b", &branch, base_branch])
            .await;
        let branch_created = match GitOutcome::classify(&create) {
            GitOutcome::Success => true,
            GitOutcome::AlreadyExists => {
                // Reuse the existing branch. Checking it out can itself
                // fail when the branch is held by a surviving worktree;
                // that is the retry path and is fine.
                let checkout = self.runner.run(&["checkout", &branch]).await;
                if !checkout.success() {
                    debug!("reusing branch {branch} without checkout: {}", checkout.stderr);
                }
                false
            }
            _ => {
                return Err(Error::coordination(
                    format!("create branch {branch}"),
                    create.combined(),
                ))
            }
        };

        // Restore the shared checkout to the base branch; the agent branch
        // must be free for the worktree to claim it.
        let restore = self.runner.run(&["checkout", base_branch]).await;
        if !restore.success() {
            warn!("could not restore checkout to {base_branch}: {}", restore.stderr);
        }

        if !worktree.exists() {
            let worktree_arg = worktree.to_string_lossy();
            let add = self
                .runner
                .run(&["worktree", "add", worktree_arg.as_ref(), &branch])
                .await;
            if !add.success() {
                // Compensate: do not leave a branch this call created.
                if branch_created {
                    let _ = self.runner.run(&["branch", "-D", &branch]).await;
                }
                error!("failed to create worktree for {agent_id}: {}", add.stderr);
                return Err(Error::coordination(
                    format!("create worktree for {agent_id}"),
                    add.combined(),
                ));
            }
        }

        let agent_info = AgentInfo::new(agent_id, &self.repo_path);
        self.publish_status(&agent_info, None).await?;
        self.agents.insert(agent_id.to_string(), agent_info.clone());

        info!(
            "created workspace for agent {agent_id} at {}",
            agent_info.worktree_path.display()
        );
        Ok(agent_info)
    }

    /// Remove an agent's workspace: force-remove the worktree, delete the
    /// status record, drop the registry entry.
    ///
    /// The branch is intentionally kept; it preserves the agent's history.
    /// Idempotent: removing an unknown or already-removed agent is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the status record exists but cannot be
    /// deleted.
    pub async fn remove_workspace(&mut self, agent_id: &str) -> Result<()> {
        let Some(agent_info) = self.agents.remove(agent_id) else {
            return Ok(());
        };

        let worktree_arg = agent_info.worktree_path.to_string_lossy();
        let remove = self
            .runner
            .run(&["worktree", "remove", worktree_arg.as_ref(), "--force"])
            .await;
        if !remove.success() {
            warn!(
                "failed to remove worktree {}: {}",
                agent_info.worktree_path.display(),
                remove.stderr
            );
        }

        self.store.remove(agent_id)?;
        info!("removed workspace for agent {agent_id}");
        Ok(())
    }

    /// Update an agent's status and publish a fresh status record.
    ///
    /// # Errors
    ///
    /// Returns `Error::AgentNotFound` for an unregistered agent.
    pub async fn update_status(
        &mut self,
        agent_id: &str,
        status: AgentStatus,
        task: Option<String>,
        message: Option<String>,
    ) -> Result<()> {
        let agent_info = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))?;

        agent_info.status = status;
        agent_info.current_task = task;
        agent_info.last_sync = Some(Utc::now());

        let snapshot = agent_info.clone();
        self.publish_status(&snapshot, message).await
    }

    /// Merge the latest upstream base branch into the agent's branch.
    ///
    /// Returns `Ok(true)` only on a clean merge. Conflict, network failure
    /// and timeout all come back as `Ok(false)`; the causes are deliberately
    /// not distinguished to the caller, only logged.
    ///
    /// # Errors
    ///
    /// Returns `Error::AgentNotFound` for an unregistered agent and
    /// `Error::Coordination` when the worktree directory is gone.
    pub async fn sync_from_upstream(&mut self, agent_id: &str) -> Result<bool> {
        let agent_info = self.require_agent(agent_id)?.clone();
        let worktree = self.ensure_worktree(&agent_info)?;

        let fetch = self.runner.run_in(&worktree, &["fetch", "origin"]).await;
        if !fetch.success() {
            debug!("fetch failed for agent {agent_id}: {}", fetch.stderr);
        }

        let target = format!("origin/{}", crate::types::DEFAULT_BASE_BRANCH);
        let merge = self
            .runner
            .run_in(&worktree, &["merge", "--no-edit", &target])
            .await;

        match GitOutcome::classify(&merge) {
            GitOutcome::Success => {
                info!("agent {agent_id} synced with {target}");
                Ok(true)
            }
            outcome => {
                warn!(
                    "sync failed for agent {agent_id} ({outcome:?}): {}",
                    merge.combined()
                );
                Ok(false)
            }
        }
    }

    /// Probe whether the agent's branch would conflict with
    /// `origin/<target_branch>`.
    ///
    /// The trial merge is always aborted; the worktree is back in a
    /// non-merging state when this returns, conflicts or not. An empty list
    /// means a clean merge is possible.
    ///
    /// # Errors
    ///
    /// Returns `Error::AgentNotFound` for an unregistered agent and
    /// `Error::Coordination` when the worktree directory is gone.
    pub async fn check_conflicts(
        &mut self,
        agent_id: &str,
        target_branch: &str,
    ) -> Result<Vec<MergeConflict>> {
        let agent_info = self.require_agent(agent_id)?.clone();
        let worktree = self.ensure_worktree(&agent_info)?;

        let fetch = self.runner.run_in(&worktree, &["fetch", "origin"]).await;
        if !fetch.success() {
            debug!("fetch failed for agent {agent_id}: {}", fetch.stderr);
        }

        let found = conflicts::trial_merge(&self.runner, &worktree, target_branch).await;
        if !found.is_empty() {
            warn!(
                "agent {agent_id} has {} conflict(s) against {target_branch}",
                found.len()
            );
        }
        Ok(found)
    }

    /// Stage and commit all pending changes in the agent's worktree, with
    /// the message tagged by agent id.
    ///
    /// Returns `Ok(None)` when there was nothing to commit - and also when
    /// the commit failed for another reason. The ambiguity is deliberate
    /// and logged; callers that need the distinction must consult the logs.
    ///
    /// # Errors
    ///
    /// Returns `Error::AgentNotFound` for an unregistered agent and
    /// `Error::Coordination` when the worktree directory is gone.
    pub async fn commit_work(&mut self, agent_id: &str, message: &str) -> Result<Option<String>> {
        let agent_info = self.require_agent(agent_id)?.clone();
        let worktree = self.ensure_worktree(&agent_info)?;

        let add = self.runner.run_in(&worktree, &["add", "-A"]).await;
        if !add.success() {
            warn!("staging failed for agent {agent_id}: {}", add.stderr);
        }

        let tagged = format!("[{agent_id}] {message}");
        let commit = self
            .runner
            .run_in(&worktree, &["commit", "-m", &tagged])
            .await;

        match GitOutcome::classify(&commit) {
            GitOutcome::Success => {}
            GitOutcome::NothingToCommit => {
                debug!("nothing to commit for agent {agent_id}");
                return Ok(None);
            }
            _ => {
                error!("commit failed for agent {agent_id}: {}", commit.combined());
                return Ok(None);
            }
        }

        let head = self.runner.run_in(&worktree, &["rev-parse", "HEAD"]).await;
        if head.success() {
            info!("agent {agent_id} committed: {}", head.stdout);
            Ok(Some(head.stdout))
        } else {
            Ok(None)
        }
    }

    /// Push the agent's branch to origin with upstream tracking set.
    ///
    /// Returns `Ok(false)` on any failure (rejection, network, timeout).
    ///
    /// # Errors
    ///
    /// Returns `Error::AgentNotFound` for an unregistered agent and
    /// `Error::Coordination` when the worktree directory is gone.
    pub async fn push_work(&mut self, agent_id: &str) -> Result<bool> {
        let agent_info = self.require_agent(agent_id)?.clone();
        let worktree = self.ensure_worktree(&agent_info)?;

        let push = self
            .runner
            .run_in(&worktree, &["push", "-u", "origin", &agent_info.branch_name])
            .await;

        if push.success() {
            info!("agent {agent_id} pushed to origin");
            Ok(true)
        } else {
            error!("push failed for agent {agent_id}: {}", push.stderr);
            Ok(false)
        }
    }

    /// Rebuild registry entries from repository state after a restart.
    ///
    /// Scans `git worktree list --porcelain` for worktrees on `agent/*`
    /// branches whose directory matches the deterministic layout and
    /// re-registers them as Idle. Already-registered agents are left
    /// untouched. Returns the recovered entries.
    ///
    /// # Errors
    ///
    /// Returns `Error::Coordination` when worktrees cannot be listed.
    pub async fn recover_workspaces(&mut self) -> Result<Vec<AgentInfo>> {
        let list = self.runner.run(&["worktree", "list", "--porcelain"]).await;
        if !list.success() {
            return Err(Error::coordination("list worktrees", list.combined()));
        }

        let mut recovered = Vec::new();
        for entry in parse_worktree_list(&list.stdout) {
            let Some(branch) = entry.branch.as_deref() else {
                continue;
            };
            let Some(agent_id) = branch.strip_prefix(crate::types::BRANCH_PREFIX) else {
                continue;
            };
            if validate_agent_id(agent_id).is_err() || self.agents.contains_key(agent_id) {
                continue;
            }
            // The directory must match the deterministic layout; foreign
            // worktrees on agent/* branches are not ours to adopt.
            let expected_name = format!("{}{agent_id}", crate::types::WORKTREE_PREFIX);
            if entry.path.file_name().and_then(|n| n.to_str()) != Some(expected_name.as_str()) {
                continue;
            }

            let mut agent_info = AgentInfo::new(agent_id, &self.repo_path);
            agent_info.worktree_path = entry.path.clone();
            self.agents
                .insert(agent_id.to_string(), agent_info.clone());
            recovered.push(agent_info);
        }

        if !recovered.is_empty() {
            info!("recovered {} agent workspace(s) from repository state", recovered.len());
        }
        Ok(recovered)
    }

    fn require_agent(&self, agent_id: &str) -> Result<&AgentInfo> {
        self.agents
            .get(agent_id)
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))
    }

    fn ensure_worktree(&self, agent_info: &AgentInfo) -> Result<PathBuf> {
        if agent_info.worktree_path.exists() {
            Ok(agent_info.worktree_path.clone())
        } else {
            Err(Error::coordination(
                format!("locate worktree for {}", agent_info.agent_id),
                format!(
                    "worktree directory missing: {}",
                    agent_info.worktree_path.display()
                ),
            ))
        }
    }

    /// Write the agent's current state through to its status record,
    /// annotating it with the worktree's head commit when resolvable.
    async fn publish_status(&self, agent_info: &AgentInfo, message: Option<String>) -> Result<()> {
        let cwd = if agent_info.worktree_path.exists() {
            agent_info.worktree_path.clone()
        } else {
            self.repo_path.clone()
        };

        let head = self.runner.run_in(&cwd, &["rev-parse", "HEAD"]).await;
        let last_commit = head.success().then(|| head.stdout.clone());

        self.store
            .write(&SyncStatus::new(agent_info, last_commit, message))
    }
}
