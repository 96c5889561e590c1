//! Filesystem-backed status store.
//!
//! One JSON file per agent under `<repo>/.agent_sync/`, read by polling.
//! This directory is the only channel visible across process boundaries, so
//! reads must tolerate whatever a concurrent or crashed writer left behind:
//! unreadable and malformed files are skipped with a warning, never surfaced
//! as errors.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::warn;

use crate::{types::SyncStatus, Result};

/// Name of the synchronization directory under the repository root.
pub const SYNC_DIR_NAME: &str = ".agent_sync";

/// Persists and retrieves per-agent status records.
#[derive(Debug, Clone)]
pub struct StatusStore {
    dir: PathBuf,
}

impl StatusStore {
    /// Open the store for a repository root, creating the synchronization
    /// directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the directory cannot be created.
    pub fn open(repo_root: &Path) -> Result<Self> {
        let dir = repo_root.join(SYNC_DIR_NAME);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The synchronization directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic record path for an agent.
    #[must_use]
    pub fn path_for(&self, agent_id: &str) -> PathBuf {
        self.dir.join(format!("{agent_id}.json"))
    }

    /// Write a record, fully overwriting any prior content for that agent.
    ///
    /// The record is written to a temporary file and renamed over the
    /// target, so readers never observe a torn write.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the filesystem operation
    /// fails.
    pub fn write(&self, record: &SyncStatus) -> Result<()> {
        let json = serde_json::to_string_pretty(record)?;
        let target = self.path_for(&record.agent_id);
        let tmp = self.dir.join(format!(".{}.json.tmp", record.agent_id));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    /// Read every parseable record in the synchronization directory.
    ///
    /// Files that cannot be read or parsed are skipped and logged; one
    /// corrupt record never hides the others.
    ///
    /// # Errors
    ///
    /// Returns an error only when the directory itself cannot be listed.
    pub fn read_all(&self) -> Result<Vec<SyncStatus>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match fs::read_to_string(&path) {
                Ok(text) => match serde_json::from_str::<SyncStatus>(&text) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!("skipping malformed status file {}: {e}", path.display()),
                },
                Err(e) => warn!("skipping unreadable status file {}: {e}", path.display()),
            }
        }

        Ok(records)
    }

    /// Delete an agent's record. Removing an absent record is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an IO error for failures other than the file being absent.
    pub fn remove(&self, agent_id: &str) -> Result<()> {
        match fs::remove_file(self.path_for(agent_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
