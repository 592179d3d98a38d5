//! Tracked container model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last-known lifecycle state of a container.
///
/// This is a cache of what the engine reported, not the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Running,
    Exited,
    Stopped,
    NotFound,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerStatus::Running => write!(f, "running"),
            ContainerStatus::Exited => write!(f, "exited"),
            ContainerStatus::Stopped => write!(f, "stopped"),
            ContainerStatus::NotFound => write!(f, "not_found"),
            ContainerStatus::Unknown => write!(f, "unknown"),
        }
    }
}

impl ContainerStatus {
    /// Map an engine `State.Status` string
    pub fn from_engine(status: Option<&str>) -> Self {
        match status {
            Some("running") => ContainerStatus::Running,
            Some("exited") => ContainerStatus::Exited,
            Some("stopped") => ContainerStatus::Stopped,
            _ => ContainerStatus::Unknown,
        }
    }

    /// Whether cleanup may remove a container in this state
    pub fn is_terminated(&self) -> bool {
        matches!(self, ContainerStatus::Exited | ContainerStatus::Stopped)
    }
}

/// One provisioned container as persisted in the state file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Engine-assigned identifier
    pub id: String,
    /// `<prefix>-<ordinal>`
    pub name: String,
    /// Host port bound to the container's sshd
    pub port: u16,
    pub status: ContainerStatus,
    /// Set once when the record is created
    pub created: DateTime<Utc>,
}

impl ContainerRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            port,
            status: ContainerStatus::Running,
            created: Utc::now(),
        }
    }

    /// Ordinal encoded in the name, if it was generated with `prefix`
    pub fn ordinal(&self, prefix: &str) -> Option<u32> {
        self.name
            .strip_prefix(prefix)?
            .strip_prefix('-')?
            .parse()
            .ok()
    }

    /// First 12 characters of the id, as the engine CLI shows it
    pub fn short_id(&self) -> &str {
        let end = self.id.char_indices().nth(12).map_or(self.id.len(), |(i, _)| i);
        &self.id[..end]
    }
}

/// Container name for an ordinal
pub fn container_name(prefix: &str, ordinal: u32) -> String {
    format!("{}-{}", prefix, ordinal)
}
