//! Results of fleet operations

use super::{ContainerRecord, ContainerStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A tracked record merged with live engine state
#[derive(Debug, Clone, Serialize)]
pub struct ContainerView {
    pub id: String,
    pub name: String,
    pub port: u16,
    pub status: ContainerStatus,
    pub created: DateTime<Utc>,
    /// `State.StartedAt`, or `created` when the engine gave none.
    /// `None` when the container could not be inspected.
    pub uptime: Option<String>,
}

impl ContainerView {
    pub fn live(record: &ContainerRecord, status: ContainerStatus, started_at: Option<String>) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            port: record.port,
            status,
            created: record.created,
            uptime: Some(started_at.unwrap_or_else(|| record.created.to_rfc3339())),
        }
    }

    pub fn not_found(record: &ContainerRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            port: record.port,
            status: ContainerStatus::NotFound,
            created: record.created,
            uptime: None,
        }
    }
}

/// Answer to a status query
#[derive(Debug, Clone, Serialize)]
pub struct FleetStatus {
    pub total: usize,
    pub containers: Vec<ContainerView>,
}

impl FleetStatus {
    pub fn count(&self, status: ContainerStatus) -> usize {
        self.containers.iter().filter(|c| c.status == status).count()
    }
}

/// Outcome of stopping the whole fleet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StopReport {
    pub stopped: usize,
    pub failed: usize,
}

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Terminated containers removed from the engine and from tracking
    pub removed: usize,
    /// Records dropped because the engine no longer knows the container
    pub dropped: usize,
    /// Records still tracked afterwards
    pub kept: usize,
}

impl CleanupReport {
    pub fn is_noop(&self) -> bool {
        self.removed == 0 && self.dropped == 0
    }
}
