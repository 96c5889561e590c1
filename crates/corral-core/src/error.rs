//! Error types for the coordination subsystem.
//!
//! The policy is uniform across all operations: an `Err` means the
//! environment or the caller is wrong (unusable repository, unknown agent,
//! invalid identifier, irrecoverable branch/worktree step). Outcomes the
//! orchestrating caller must handle as ordinary branching logic - merge
//! conflicts, nothing to commit, push rejection - are falsy return values
//! (`false`, `None`, empty list), never errors.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for workspace coordination.
#[derive(Debug, Error)]
pub enum Error {
    /// Repository root is unusable: missing, not a git repository, or the
    /// synchronization directory cannot be created.
    #[error("repository configuration error: {0}")]
    Configuration(String),

    /// Operation referenced an agent that is not in the registry.
    #[error("agent '{0}' is not registered")]
    AgentNotFound(String),

    /// Agent identifier cannot be mapped onto a branch name and worktree
    /// path.
    #[error("invalid agent id '{id}': {reason}")]
    InvalidAgentId {
        /// The rejected identifier.
        id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A required branch or worktree step failed irrecoverably, possibly
    /// after earlier steps succeeded.
    #[error("{operation} failed: {detail}")]
    Coordination {
        /// The step that failed.
        operation: String,
        /// Diagnostic text from the underlying tool.
        detail: String,
    },

    /// Filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Status record could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid-agent-id error.
    pub fn invalid_agent_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAgentId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a coordination error for a failed branch/worktree step.
    pub fn coordination(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Coordination {
            operation: operation.into(),
            detail: detail.into(),
        }
    }
}
