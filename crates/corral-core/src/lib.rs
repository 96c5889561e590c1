//! # Corral Core
//!
//! Workspace coordination for multiple autonomous agents working
//! concurrently against one shared git repository.
//!
//! Each agent gets an isolated workspace - a dedicated branch plus a
//! dedicated worktree - so concurrent work never collides. A poll-based
//! status channel (one JSON record per agent under `.agent_sync/`) lets
//! agents and observers discover each other's progress without a running
//! coordination server, and a trial-merge probe lets an agent check whether
//! its branch can merge cleanly before committing to doing so.
//!
//! ## Laws (Compiler Enforced)
//!
//! - No `unwrap()` - returns `Result` instead
//! - No `expect()` - returns `Result` instead
//! - No `panic!()` - returns `Result` instead
//! - No `unsafe` - safe Rust only
//!
//! ## Error Handling
//!
//! All fallible operations return `Result<T, Error>`. Errors mean the
//! environment or caller is wrong; routine git-level non-successes (merge
//! conflict, nothing to commit, push rejection) are falsy return values the
//! caller branches on.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod conflicts;
pub mod coordinator;
mod error;
pub mod git;
pub mod status;
pub mod types;

pub use conflicts::MergeConflict;
pub use coordinator::WorkspaceCoordinator;
pub use error::{Error, Result};
pub use git::{GitOutcome, GitOutput, GitRunner, DEFAULT_GIT_TIMEOUT};
pub use status::{StatusStore, SYNC_DIR_NAME};
pub use types::{AgentInfo, AgentStatus, SyncStatus, DEFAULT_BASE_BRANCH};
