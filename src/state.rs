//! JSON state file storage
//!
//! The whole fleet is rewritten on every save. There is no locking: one
//! podmo process is assumed to own the file at a time.

use crate::models::ContainerRecord;
use crate::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_STATE_FILE: &str = "orchestrator-state.json";

/// Persisted fleet state
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load tracked records.
    ///
    /// A missing file is an empty fleet. An unreadable or malformed file is
    /// logged and also treated as an empty fleet.
    pub fn load(&self) -> Vec<ContainerRecord> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read state file, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str(&data) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Malformed state file, starting empty");
                Vec::new()
            }
        }
    }

    /// Replace the state file with `records`.
    ///
    /// Written to a temp file in the same directory and renamed over the
    /// target, so a crash never leaves a truncated file behind.
    pub fn save(&self, records: &[ContainerRecord]) -> Result<()> {
        let data = serde_json::to_string_pretty(records)?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(&parent)?;
        temp.write_all(data.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        tracing::debug!(path = %self.path.display(), records = records.len(), "State saved");
        Ok(())
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_FILE)
    }
}
