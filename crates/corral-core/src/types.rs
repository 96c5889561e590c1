//! Domain types for agent workspace coordination.
//!
//! An agent is identified by an opaque, caller-supplied id. Its branch name
//! and worktree path are derived deterministically from that id, so every
//! piece of on-disk state can be recomputed from the id plus the repository
//! root.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Branch namespace reserved for agent branches.
pub const BRANCH_PREFIX: &str = "agent/";

/// Directory-name prefix for agent worktrees.
pub const WORKTREE_PREFIX: &str = "worktree_";

/// Base branch used when the caller does not specify one.
pub const DEFAULT_BASE_BRANCH: &str = "main";

/// Maximum accepted agent id length.
const MAX_AGENT_ID_LEN: usize = 64;

/// Status of an agent's work.
///
/// The transition graph is unconstrained: any status may follow any other
/// via an explicit status update.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AgentStatus {
    /// Workspace provisioned, no task in progress.
    Idle,
    /// Actively working on a task.
    Working,
    /// Blocked on another agent or external input.
    Waiting,
    /// Task finished.
    Completed,
    /// Task failed.
    Error,
}

/// In-memory registry entry for one agent's workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Opaque unique id, caller-supplied.
    pub agent_id: String,
    /// Branch derived from the id (`agent/<id>`).
    pub branch_name: String,
    /// Isolated working directory for the branch.
    pub worktree_path: PathBuf,
    /// Current status.
    pub status: AgentStatus,
    /// Timestamp of the most recent status update.
    pub last_sync: Option<DateTime<Utc>>,
    /// Free-text description of the current task.
    pub current_task: Option<String>,
}

impl AgentInfo {
    /// Build a fresh Idle registry entry with derived branch and worktree.
    #[must_use]
    pub fn new(agent_id: &str, repo_root: &Path) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            branch_name: branch_for(agent_id),
            worktree_path: worktree_path_for(repo_root, agent_id),
            status: AgentStatus::Idle,
            last_sync: None,
            current_task: None,
        }
    }
}

/// Persisted status record, one JSON file per agent.
///
/// Every write fully overwrites the prior file; no history is kept in the
/// file itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Agent the record belongs to.
    pub agent_id: String,
    /// Status at write time.
    pub status: AgentStatus,
    /// The agent's branch.
    pub branch: String,
    /// Head commit of the agent's worktree, when resolvable.
    pub last_commit: Option<String>,
    /// Write time, RFC 3339.
    pub timestamp: DateTime<Utc>,
    /// Optional free-text message.
    pub message: Option<String>,
}

impl SyncStatus {
    /// Snapshot a registry entry into a persistable record, stamped now.
    #[must_use]
    pub fn new(info: &AgentInfo, last_commit: Option<String>, message: Option<String>) -> Self {
        Self {
            agent_id: info.agent_id.clone(),
            status: info.status,
            branch: info.branch_name.clone(),
            last_commit,
            timestamp: Utc::now(),
            message,
        }
    }
}

/// Derive the branch name for an agent id.
#[must_use]
pub fn branch_for(agent_id: &str) -> String {
    format!("{BRANCH_PREFIX}{agent_id}")
}

/// Derive the worktree path for an agent id.
///
/// Worktrees live next to the repository, in its parent directory, so they
/// never shadow tracked files inside the checkout.
#[must_use]
pub fn worktree_path_for(repo_root: &Path, agent_id: &str) -> PathBuf {
    let parent = repo_root.parent().unwrap_or(repo_root);
    parent.join(format!("{WORKTREE_PREFIX}{agent_id}"))
}

/// Validate an agent id before deriving branch names and paths from it.
///
/// # Errors
///
/// Returns `Error::InvalidAgentId` when the id is empty, longer than 64
/// characters, or contains characters outside `[A-Za-z0-9._-]`.
pub fn validate_agent_id(agent_id: &str) -> Result<()> {
    if agent_id.trim().is_empty() {
        return Err(Error::invalid_agent_id(agent_id, "id cannot be empty"));
    }

    if agent_id.len() > MAX_AGENT_ID_LEN {
        return Err(Error::invalid_agent_id(
            agent_id,
            format!("id exceeds maximum length of {MAX_AGENT_ID_LEN} characters"),
        ));
    }

    let invalid: String = agent_id
        .chars()
        .filter(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        .collect();

    if invalid.is_empty() {
        Ok(())
    } else {
        Err(Error::invalid_agent_id(
            agent_id,
            format!("id contains invalid characters: {invalid}"),
        ))
    }
}
